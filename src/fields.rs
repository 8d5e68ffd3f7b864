//! Named EXIF fields
//!
//! A static table maps field names to their IFD, tag id and semantic kind,
//! so a presentation layer can list fields and convert between display
//! text and stored values without knowing TIFF types.

use chrono::NaiveDateTime;

use crate::{
    error::{Error, Result},
    tiff::{tags, Format, Ifd, Value},
};

/// EXIF date layout, `YYYY:MM:DD HH:MM:SS`
pub const DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Character code prefix of UserComment values
const COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const COMMENT_UNDEFINED: &[u8; 8] = &[0; 8];
const COMMENT_PREFIX_LEN: usize = 8;

/// How a field's value is presented and edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text
    Text,
    /// Date and time in EXIF layout
    Date,
    /// One or more numbers, integers or rationals
    Numeric,
}

/// A named field in the EXIF block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub title: &'static str,
    pub ifd: Ifd,
    pub tag: u16,
    pub kind: FieldKind,
    /// TIFF type written by [`Field::parse_text`]
    pub format: Format,
}

macro_rules! field {
    ($name:literal, $title:literal, $ifd:ident, $tag:ident, $kind:ident, $format:ident) => {
        Field {
            name: $name,
            title: $title,
            ifd: Ifd::$ifd,
            tag: tags::$tag,
            kind: FieldKind::$kind,
            format: Format::$format,
        }
    };
}

/// Every field known by name
pub static FIELDS: &[Field] = &[
    field!("Make", "Camera maker", Ifd0, MAKE, Text, Ascii),
    field!("Model", "Camera model", Ifd0, MODEL, Text, Ascii),
    field!("ImageDescription", "Description", Ifd0, IMAGE_DESCRIPTION, Text, Ascii),
    field!("Artist", "Artist", Ifd0, ARTIST, Text, Ascii),
    field!("Copyright", "Copyright", Ifd0, COPYRIGHT, Text, Ascii),
    field!("Software", "Software", Ifd0, SOFTWARE, Text, Ascii),
    field!("DateTime", "Date modified", Ifd0, DATE_TIME, Date, Ascii),
    field!("Orientation", "Orientation", Ifd0, ORIENTATION, Numeric, Short),
    field!("DateTimeOriginal", "Date taken", Exif, DATE_TIME_ORIGINAL, Date, Ascii),
    field!("DateTimeDigitized", "Date digitized", Exif, DATE_TIME_DIGITIZED, Date, Ascii),
    field!("ExposureTime", "Exposure time", Exif, EXPOSURE_TIME, Numeric, Rational),
    field!("FNumber", "F-number", Exif, F_NUMBER, Numeric, Rational),
    field!("ISOSpeedRatings", "ISO speed", Exif, ISO_SPEED, Numeric, Short),
    field!("ApertureValue", "Aperture", Exif, APERTURE_VALUE, Numeric, Rational),
    field!("ShutterSpeedValue", "Shutter speed", Exif, SHUTTER_SPEED_VALUE, Numeric, SRational),
    field!("Flash", "Flash", Exif, FLASH, Numeric, Short),
    field!("FocalLength", "Focal length", Exif, FOCAL_LENGTH, Numeric, Rational),
    field!("UserComment", "Comment", Exif, USER_COMMENT, Text, Undefined),
];

/// Find a field by name
pub fn lookup(name: &str) -> Option<&'static Field> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Find a field by name, or fail with [`Error::UnknownField`]
pub fn resolve(name: &str) -> Result<&'static Field> {
    lookup(name).ok_or_else(|| Error::UnknownField(name.to_string()))
}

/// Find the field stored at `tag` in `ifd`
pub fn by_tag(ifd: Ifd, tag: u16) -> Option<&'static Field> {
    FIELDS.iter().find(|f| f.ifd == ifd && f.tag == tag)
}

/// Human-readable label of a field
pub fn title(name: &str) -> Option<&'static str> {
    lookup(name).map(|f| f.title)
}

impl Field {
    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidValue {
            field: self.name.to_string(),
            reason: reason.into(),
        }
    }

    /// Display text of a stored value
    pub fn to_text(&self, value: &Value) -> String {
        match value {
            Value::Undefined(bytes) if self.tag == tags::USER_COMMENT => comment_text(bytes)
                .unwrap_or_else(|| value.to_string()),
            _ => value.to_string(),
        }
    }

    /// Convert display text into a value of this field's type
    ///
    /// Returns `Ok(None)` for empty text, meaning the entry should be removed.
    pub fn parse_text(&self, text: &str) -> Result<Option<Value>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let value = match self.kind {
            FieldKind::Text => {
                if text.contains('\0') {
                    return Err(self.invalid("text contains a NUL character"));
                }
                match self.format {
                    Format::Undefined => {
                        let mut bytes = COMMENT_ASCII.to_vec();
                        bytes.extend_from_slice(text.as_bytes());
                        Value::Undefined(bytes)
                    }
                    _ => Value::ascii(text),
                }
            }
            FieldKind::Date => {
                let date = NaiveDateTime::parse_from_str(text, DATE_FORMAT)
                    .map_err(|e| self.invalid(format!("expected YYYY:MM:DD HH:MM:SS ({})", e)))?;
                Value::ascii(&date.format(DATE_FORMAT).to_string())
            }
            FieldKind::Numeric => self.parse_numbers(text)?,
        };

        Ok(Some(value))
    }

    fn parse_numbers(&self, text: &str) -> Result<Value> {
        let parts: Vec<(i64, i64)> = text
            .split(',')
            .map(|part| {
                parse_fraction(part.trim())
                    .ok_or_else(|| self.invalid(format!("'{}' is not a number", part.trim())))
            })
            .collect::<Result<_>>()?;

        let integer = |(n, d): (i64, i64)| {
            if d == 1 {
                Ok(n)
            } else {
                Err(self.invalid(format!("{}/{} is not an integer", n, d)))
            }
        };
        let range = |n: i64| self.invalid(format!("{} is out of range", n));

        Ok(match self.format {
            Format::Short => Value::Short(
                parts
                    .into_iter()
                    .map(|p| integer(p).and_then(|n| u16::try_from(n).map_err(|_| range(n))))
                    .collect::<Result<_>>()?,
            ),
            Format::Long => Value::Long(
                parts
                    .into_iter()
                    .map(|p| integer(p).and_then(|n| u32::try_from(n).map_err(|_| range(n))))
                    .collect::<Result<_>>()?,
            ),
            Format::SRational => Value::SRational(
                parts
                    .into_iter()
                    .map(|(n, d)| -> Result<(i32, i32)> {
                        Ok((
                            i32::try_from(n).map_err(|_| range(n))?,
                            i32::try_from(d).map_err(|_| range(d))?,
                        ))
                    })
                    .collect::<Result<_>>()?,
            ),
            _ => Value::Rational(
                parts
                    .into_iter()
                    .map(|(n, d)| -> Result<(u32, u32)> {
                        Ok((
                            u32::try_from(n).map_err(|_| range(n))?,
                            u32::try_from(d).map_err(|_| range(d))?,
                        ))
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

/// Text of a UserComment with an ASCII or unspecified character code
fn comment_text(bytes: &[u8]) -> Option<String> {
    if bytes.len() < COMMENT_PREFIX_LEN {
        return None;
    }
    let (prefix, body) = bytes.split_at(COMMENT_PREFIX_LEN);
    if prefix != COMMENT_ASCII && prefix != COMMENT_UNDEFINED {
        return None;
    }
    let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    Some(String::from_utf8_lossy(&body[..end]).trim_end().to_string())
}

/// Parse `n/d`, a decimal or an integer into a reduced fraction
fn parse_fraction(text: &str) -> Option<(i64, i64)> {
    let (n, d) = if let Some((n, d)) = text.split_once('/') {
        let d: i64 = d.trim().parse().ok()?;
        if d == 0 {
            return None;
        }
        (n.trim().parse().ok()?, d)
    } else if let Some((whole, frac)) = text.split_once('.') {
        let (negative, whole) = match whole.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, whole),
        };
        let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if frac.is_empty() || frac.len() > 9 || !digits_only(frac) || !digits_only(whole) {
            return None;
        }
        let den = 10i64.pow(frac.len() as u32);
        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let num = whole.checked_mul(den)?.checked_add(frac.parse().ok()?)?;
        (if negative { -num } else { num }, den)
    } else {
        (text.parse().ok()?, 1)
    };

    let g = gcd(n.unsigned_abs(), d.unsigned_abs()).max(1) as i64;
    let (n, d) = (n / g, d / g);
    Some(if d < 0 { (n.checked_neg()?, d.checked_neg()?) } else { (n, d) })
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        for (i, field) in FIELDS.iter().enumerate() {
            assert!(FIELDS[i + 1..].iter().all(|f| f.name != field.name));
            assert!(FIELDS[i + 1..]
                .iter()
                .all(|f| (f.ifd, f.tag) != (field.ifd, field.tag)));
        }
    }

    #[test]
    fn test_lookup_and_title() {
        let make = lookup("Make").unwrap();
        assert_eq!((make.ifd, make.tag), (Ifd::Ifd0, tags::MAKE));
        assert_eq!(title("DateTimeOriginal"), Some("Date taken"));
        assert_eq!(by_tag(Ifd::Exif, tags::FLASH).map(|f| f.name), Some("Flash"));
        assert!(lookup("make").is_none());
        assert!(matches!(resolve("Nope"), Err(Error::UnknownField(_))));
    }

    #[test]
    fn test_parse_text_kinds() {
        let artist = lookup("Artist").unwrap();
        assert_eq!(artist.parse_text("Ann").unwrap(), Some(Value::ascii("Ann")));
        assert_eq!(artist.parse_text("   ").unwrap(), None);

        let date = lookup("DateTime").unwrap();
        assert_eq!(
            date.parse_text("2020:02:29 23:59:00").unwrap(),
            Some(Value::ascii("2020:02:29 23:59:00"))
        );
        assert!(matches!(
            date.parse_text("2021:02:29 23:59:00"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(date.parse_text("2020-02-29").is_err());
    }

    #[test]
    fn test_parse_numeric() {
        let f_number = lookup("FNumber").unwrap();
        assert_eq!(f_number.parse_text("2.8").unwrap(), Some(Value::Rational(vec![(14, 5)])));
        assert_eq!(f_number.parse_text("28/10").unwrap(), Some(Value::Rational(vec![(14, 5)])));
        assert!(f_number.parse_text("-1").is_err());

        let shutter = lookup("ShutterSpeedValue").unwrap();
        assert_eq!(shutter.parse_text("-1/3").unwrap(), Some(Value::SRational(vec![(-1, 3)])));

        let iso = lookup("ISOSpeedRatings").unwrap();
        assert_eq!(iso.parse_text("100, 200").unwrap(), Some(Value::Short(vec![100, 200])));
        assert!(iso.parse_text("1.5").is_err());
        assert!(iso.parse_text("70000").is_err());
        assert!(iso.parse_text("abc").is_err());
    }

    #[test]
    fn test_user_comment() {
        let comment = lookup("UserComment").unwrap();
        let value = comment.parse_text("hello").unwrap().unwrap();
        assert_eq!(value, Value::Undefined(b"ASCII\0\0\0hello".to_vec()));
        assert_eq!(comment.to_text(&value), "hello");
        assert_eq!(comment.to_text(&Value::undefined(b"\0\0\0\0\0\0\0\0hi\0".to_vec())), "hi");
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("3"), Some((3, 1)));
        assert_eq!(parse_fraction("-0.25"), Some((-1, 4)));
        assert_eq!(parse_fraction(".5"), Some((1, 2)));
        assert_eq!(parse_fraction("1/-2"), Some((-1, 2)));
        assert_eq!(parse_fraction("1/0"), None);
        assert_eq!(parse_fraction("1."), None);
        assert_eq!(parse_fraction("-9223372036854775808/1"), Some((i64::MIN, 1)));
        assert_eq!(parse_fraction("-9223372036854775808/-1"), None);
    }

    #[test]
    fn test_extreme_fraction_is_rejected() {
        let f_number = lookup("FNumber").unwrap();
        assert!(matches!(
            f_number.parse_text("-9223372036854775808/-1"),
            Err(Error::InvalidValue { .. })
        ));
    }
}
