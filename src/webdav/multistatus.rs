//! Parser for `207 Multi-Status` bodies.
//!
//! Parsing is a pure step: the whole body goes in, an immutable list of
//! [`DavResource`] records comes out.

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::{DavError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementName {
    Multistatus,
    Response,
    Propstat,
    Prop,
    Href,
    Status,
    Displayname,
    Getetag,
    Getctag,
    Resourcetype,
    CurrentUserPrincipal,
    CalendarHomeSet,
    AddressbookHomeSet,
    AddMember,
    CurrentUserPrivilegeSet,
    Privilege,
    SupportedCalendarComponentSet,
    Comp,
    CalendarData,
    AddressData,
    Other,
}

/// Local part of a possibly prefixed element name, lower-cased.
fn local_name(raw: &[u8]) -> String {
    let local = match raw.iter().position(|b| *b == b':') {
        Some(idx) => &raw[idx + 1..],
        None => raw,
    };
    String::from_utf8_lossy(local).to_ascii_lowercase()
}

pub fn element_from_name(local: &str) -> ElementName {
    match local {
        "multistatus" => ElementName::Multistatus,
        "response" => ElementName::Response,
        "propstat" => ElementName::Propstat,
        "prop" => ElementName::Prop,
        "href" => ElementName::Href,
        "status" => ElementName::Status,
        "displayname" => ElementName::Displayname,
        "getetag" => ElementName::Getetag,
        "getctag" => ElementName::Getctag,
        "resourcetype" => ElementName::Resourcetype,
        "current-user-principal" => ElementName::CurrentUserPrincipal,
        "calendar-home-set" => ElementName::CalendarHomeSet,
        "addressbook-home-set" => ElementName::AddressbookHomeSet,
        "add-member" => ElementName::AddMember,
        "current-user-privilege-set" => ElementName::CurrentUserPrivilegeSet,
        "privilege" => ElementName::Privilege,
        "supported-calendar-component-set" => ElementName::SupportedCalendarComponentSet,
        "comp" => ElementName::Comp,
        "calendar-data" => ElementName::CalendarData,
        "address-data" => ElementName::AddressData,
        _ => ElementName::Other,
    }
}

/// Properties of one resource, merged from all successful propstat blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavProps {
    /// Children of `resourcetype`, as lower-cased local names.
    pub resource_types: Vec<String>,
    pub displayname: Option<String>,
    pub etag: Option<String>,
    pub ctag: Option<String>,
    pub current_user_principal: Vec<String>,
    pub calendar_home_set: Vec<String>,
    pub addressbook_home_set: Vec<String>,
    pub add_member: Vec<String>,
    /// `None` when the server did not report `current-user-privilege-set`.
    pub privileges: Option<Vec<String>>,
    pub supported_components: Vec<String>,
    /// `calendar-data` or `address-data`.
    pub data: Option<String>,
}

impl DavProps {
    pub fn has_type(&self, name: &str) -> bool {
        self.resource_types.iter().any(|t| t == name)
    }

    pub fn is_collection(&self) -> bool {
        self.has_type("collection")
    }

    /// Read-only unless the privilege set is present and grants no write
    /// access of any kind.
    pub fn is_read_only(&self) -> bool {
        match &self.privileges {
            None => false,
            Some(privileges) => !privileges
                .iter()
                .any(|p| matches!(p.as_str(), "all" | "write" | "write-content" | "bind")),
        }
    }

    fn absorb(&mut self, other: DavProps) {
        self.resource_types.extend(other.resource_types);
        self.current_user_principal
            .extend(other.current_user_principal);
        self.calendar_home_set.extend(other.calendar_home_set);
        self.addressbook_home_set.extend(other.addressbook_home_set);
        self.add_member.extend(other.add_member);
        self.supported_components.extend(other.supported_components);
        if other.displayname.is_some() {
            self.displayname = other.displayname;
        }
        if other.etag.is_some() {
            self.etag = other.etag;
        }
        if other.ctag.is_some() {
            self.ctag = other.ctag;
        }
        if other.data.is_some() {
            self.data = other.data;
        }
        if let Some(privileges) = other.privileges {
            self.privileges
                .get_or_insert_with(Vec::new)
                .extend(privileges);
        }
    }
}

/// One `<D:response>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResource {
    pub href: String,
    /// Response-level status, as sent for missing multi-get members.
    pub status: Option<u16>,
    pub props: DavProps,
}

fn parse_status_line(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

struct MultistatusParser {
    stack: Vec<ElementName>,
    text: String,
    current: DavResource,
    propstat: DavProps,
    propstat_status: Option<u16>,
    resources: Vec<DavResource>,
}

impl MultistatusParser {
    fn new() -> Self {
        Self {
            stack: Vec::with_capacity(16),
            text: String::new(),
            current: DavResource::default(),
            propstat: DavProps::default(),
            propstat_status: None,
            resources: Vec::new(),
        }
    }

    fn path_ends_with(&self, needle: &[ElementName]) -> bool {
        self.stack.len() >= needle.len()
            && self.stack[self.stack.len() - needle.len()..] == needle[..]
    }

    /// Parent of the innermost element.
    fn parent_is(&self, needle: &[ElementName]) -> bool {
        match self.stack.split_last() {
            Some((_, rest)) => {
                rest.len() >= needle.len() && rest[rest.len() - needle.len()..] == needle[..]
            }
            None => false,
        }
    }

    fn on_start(&mut self, event: &BytesStart<'_>) -> Result<()> {
        let local = local_name(event.name().as_ref());
        let element = element_from_name(&local);
        self.stack.push(element);
        self.text.clear();

        match element {
            ElementName::Response => self.current = DavResource::default(),
            ElementName::Propstat => {
                self.propstat = DavProps::default();
                self.propstat_status = None;
            }
            ElementName::CurrentUserPrivilegeSet
                if self.path_ends_with(&[ElementName::Prop, ElementName::CurrentUserPrivilegeSet]) =>
            {
                self.propstat.privileges.get_or_insert_with(Vec::new);
            }
            ElementName::Comp
                if self.path_ends_with(&[
                    ElementName::Prop,
                    ElementName::SupportedCalendarComponentSet,
                    ElementName::Comp,
                ]) =>
            {
                for attr in event.attributes().with_checks(false) {
                    let attr = attr.map_err(|e| DavError::Xml(e.to_string()))?;
                    if attr.key.as_ref().eq_ignore_ascii_case(b"name") {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| DavError::Xml(format!("invalid attribute: {e}")))?
                            .into_owned();
                        if !value.is_empty() {
                            self.propstat.supported_components.push(value);
                        }
                    }
                }
            }
            _ => {
                if self.parent_is(&[ElementName::Prop, ElementName::Resourcetype]) {
                    self.propstat.resource_types.push(local);
                } else if self.parent_is(&[
                    ElementName::CurrentUserPrivilegeSet,
                    ElementName::Privilege,
                ]) {
                    self.propstat
                        .privileges
                        .get_or_insert_with(Vec::new)
                        .push(local);
                }
            }
        }
        Ok(())
    }

    fn on_end(&mut self) {
        let text = std::mem::take(&mut self.text);
        let trimmed = text.trim();

        if self.path_ends_with(&[ElementName::Response, ElementName::Href]) {
            self.current.href = trimmed.to_string();
        } else if self.path_ends_with(&[ElementName::Response, ElementName::Status]) {
            self.current.status = parse_status_line(trimmed);
        } else if self.path_ends_with(&[ElementName::Propstat, ElementName::Status]) {
            self.propstat_status = parse_status_line(trimmed);
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Displayname]) {
            self.propstat.displayname = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Getetag]) {
            if !trimmed.is_empty() {
                self.propstat.etag = Some(trimmed.to_string());
            }
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::Getctag]) {
            if !trimmed.is_empty() {
                self.propstat.ctag = Some(trimmed.to_string());
            }
        } else if self.path_ends_with(&[
            ElementName::Prop,
            ElementName::CurrentUserPrincipal,
            ElementName::Href,
        ]) {
            push_href(&mut self.propstat.current_user_principal, trimmed);
        } else if self.path_ends_with(&[
            ElementName::Prop,
            ElementName::CalendarHomeSet,
            ElementName::Href,
        ]) {
            push_href(&mut self.propstat.calendar_home_set, trimmed);
        } else if self.path_ends_with(&[
            ElementName::Prop,
            ElementName::AddressbookHomeSet,
            ElementName::Href,
        ]) {
            push_href(&mut self.propstat.addressbook_home_set, trimmed);
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::AddMember, ElementName::Href])
        {
            push_href(&mut self.propstat.add_member, trimmed);
        } else if self.path_ends_with(&[ElementName::Prop, ElementName::CalendarData])
            || self.path_ends_with(&[ElementName::Prop, ElementName::AddressData])
        {
            // payloads are kept verbatim
            self.propstat.data = Some(text);
        }

        match self.stack.pop() {
            Some(ElementName::Propstat) => {
                let props = std::mem::take(&mut self.propstat);
                if self.propstat_status.is_none_or(|s| (200..300).contains(&s)) {
                    self.current.props.absorb(props);
                }
            }
            Some(ElementName::Response) => {
                let finished = std::mem::take(&mut self.current);
                self.resources.push(finished);
            }
            _ => {}
        }
    }

    fn on_text(&mut self, text: &str) {
        self.text.push_str(text);
    }
}

fn push_href(target: &mut Vec<String>, href: &str) {
    if !href.is_empty() {
        target.push(href.to_string());
    }
}

fn resolve_reference(name: &str) -> String {
    let reference = format!("&{name};");
    match unescape(&reference) {
        Ok(resolved) => resolved.into_owned(),
        Err(_) => reference,
    }
}

/// Parse an aggregated `207 Multi-Status` body.
pub fn parse_multistatus(body: &[u8]) -> Result<Vec<DavResource>> {
    let mut xml = Reader::from_reader(body);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(e) => parser.on_start(&e)?,
            Event::Empty(e) => {
                parser.on_start(&e)?;
                parser.on_end();
            }
            Event::Text(e) => parser.on_text(&String::from_utf8_lossy(e.as_ref())),
            Event::CData(e) => parser.on_text(&String::from_utf8_lossy(e.as_ref())),
            Event::GeneralRef(e) => {
                let name = String::from_utf8_lossy(&e).into_owned();
                parser.on_text(&resolve_reference(&name));
            }
            Event::End(_) => parser.on_end(),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(parser.resources)
}
