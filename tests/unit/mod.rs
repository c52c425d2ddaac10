mod candidate_tests;
mod config_tests;
mod content_tests;
mod multistatus_tests;
mod quirk_tests;
mod uid_tests;
mod xml_tests;
