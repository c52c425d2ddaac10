//! The closed set of item types a collection source can hold.

use crate::webdav::multistatus::DavProps;

/// Item type of a collection, chosen once when the source is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Event,
    Todo,
    Journal,
    Card,
}

impl ContentKind {
    /// iCalendar/vCard component name.
    pub fn component(self) -> &'static str {
        match self {
            ContentKind::Event => "VEVENT",
            ContentKind::Todo => "VTODO",
            ContentKind::Journal => "VJOURNAL",
            ContentKind::Card => "VCARD",
        }
    }

    pub fn is_card(self) -> bool {
        self == ContentKind::Card
    }

    /// MIME type sent with PUT/POST and requested by GET.
    pub fn content_type(self) -> &'static str {
        if self.is_card() {
            "text/vcard; charset=utf-8"
        } else {
            "text/calendar; charset=utf-8"
        }
    }

    /// Suffix appended to generated resource names.
    pub fn suffix(self) -> &'static str {
        if self.is_card() { ".vcf" } else { ".ics" }
    }

    pub fn well_known_path(self) -> &'static str {
        if self.is_card() {
            "/.well-known/carddav"
        } else {
            "/.well-known/caldav"
        }
    }

    /// Service name used for DNS SRV/TXT lookups.
    pub fn service(self) -> &'static str {
        if self.is_card() { "carddav" } else { "caldav" }
    }

    /// XML namespace of the protocol extension.
    pub fn namespace(self) -> &'static str {
        if self.is_card() {
            "urn:ietf:params:xml:ns:carddav"
        } else {
            "urn:ietf:params:xml:ns:caldav"
        }
    }

    /// Element carrying the payload inside REPORT answers.
    pub fn data_element(self) -> &'static str {
        if self.is_card() {
            "address-data"
        } else {
            "calendar-data"
        }
    }

    /// Calendar collections may hold events, tasks and journals side by side;
    /// address books only hold contacts.
    pub fn is_mixed(self) -> bool {
        !self.is_card()
    }

    /// Whether a collection described by `props` holds items of this kind.
    pub fn type_matches(self, props: &DavProps) -> bool {
        if self.is_card() {
            return props.has_type("addressbook");
        }
        props.has_type("calendar")
            && (props.supported_components.is_empty()
                || props
                    .supported_components
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(self.component())))
    }

    /// A leaf collection cannot contain further collections of another type.
    pub fn is_leaf_collection(props: &DavProps) -> bool {
        props.has_type("calendar") || props.has_type("addressbook")
    }
}
