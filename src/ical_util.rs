use ical::property::{Property, PropertyParser};

/// Parses one logical line into a property. Lines that are not properties give `None`.
///
/// See <https://tools.ietf.org/html/rfc5545#section-3.1>
pub fn parse_property(line: &str) -> Option<Property> {
    PropertyParser::from_reader(line.as_bytes()).next()?.ok()
}

pub fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|property| property.name == name)
}

/// Returns the trimmed value of the first property whose name matches exactly.
pub fn find_property_value<'a>(properties: &'a [Property], name: &str) -> Option<&'a str> {
    find_property(properties, name).and_then(property_value)
}

pub fn property_value(property: &Property) -> Option<&str> {
    property.value.as_deref().map(str::trim)
}

/// True for `BEGIN:<component>` or `END:<component>` lines, depending on `marker`.
pub fn is_component_marker(property: &Property, marker: &str, component: &str) -> bool {
    property.name == marker && property_value(property) == Some(component)
}

/// Resolves the TEXT escapes of <https://tools.ietf.org/html/rfc5545#section-3.3.11>.
pub fn sanitise_string(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => output.push('\n'),
            Some(escaped) => output.push(escaped),
            None => output.push('\\'),
        }
    }
    output
}
