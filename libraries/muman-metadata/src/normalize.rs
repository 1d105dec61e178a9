/// Tag value normalization
use muman_core::Field;

/// Parse a track or disc number.
///
/// `"3"`, `"03"` and `"3/12"` all yield 3. Zero, negative and malformed
/// values are unknown.
pub fn parse_position(raw: Option<&str>) -> Field<u32> {
    raw.map(|text| text.split('/').next().unwrap_or("").trim())
        .and_then(|number| number.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .into()
}

/// Parse a year out of a date tag (`"1997"`, `"1997-03-01"`, `"1997/03"`)
pub fn parse_year(raw: Option<&str>) -> Field<u32> {
    let Some(text) = raw.map(str::trim) else {
        return Field::Unknown;
    };
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() != 4 {
        return Field::Unknown;
    }
    digits.parse::<u32>().ok().filter(|y| *y > 0).into()
}

/// Upper-case an ISRC and drop separators; anything not 12 alphanumerics is
/// unknown
pub fn normalize_isrc(raw: Option<&str>) -> Field<String> {
    let Some(text) = raw else {
        return Field::Unknown;
    };
    let code: String = text
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if code.len() == 12 && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Field::Known(code)
    } else {
        Field::Unknown
    }
}
