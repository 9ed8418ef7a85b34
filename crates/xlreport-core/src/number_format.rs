//! Number format types

/// Number format a cell is displayed with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    /// General format (default)
    #[default]
    General,

    /// Built-in format by ID
    BuiltIn(u32),

    /// Custom format string
    Custom(String),
}

impl NumberFormat {
    /// 0 - General
    pub const ID_GENERAL: u32 = 0;
    /// 1 - 0
    pub const ID_NUMBER_INT: u32 = 1;
    /// 2 - 0.00
    pub const ID_NUMBER_DEC2: u32 = 2;
    /// 14 - mm-dd-yy
    pub const ID_DATE_SHORT: u32 = 14;
    /// 49 - @
    pub const ID_TEXT: u32 = 49;

    /// First ID available for custom formats in `styles.xml`
    pub const FIRST_CUSTOM_ID: u32 = 164;

    /// Create a number format from a format string
    ///
    /// Strings matching a built-in format are mapped to it.
    pub fn from_string<S: Into<String>>(format: S) -> Self {
        let format = format.into();
        match format.as_str() {
            "General" => NumberFormat::General,
            "0" => NumberFormat::BuiltIn(Self::ID_NUMBER_INT),
            "0.00" => NumberFormat::BuiltIn(Self::ID_NUMBER_DEC2),
            "@" => NumberFormat::BuiltIn(Self::ID_TEXT),
            _ => NumberFormat::Custom(format),
        }
    }

    /// Resolve a `numFmtId` from `styles.xml`
    pub fn from_id(id: u32) -> Self {
        if id == Self::ID_GENERAL {
            NumberFormat::General
        } else {
            NumberFormat::BuiltIn(id)
        }
    }

    /// The `numFmtId` to write for a built-in format, if this is one
    pub fn builtin_id(&self) -> Option<u32> {
        match self {
            NumberFormat::General => Some(Self::ID_GENERAL),
            NumberFormat::BuiltIn(id) => Some(*id),
            NumberFormat::Custom(_) => None,
        }
    }

    /// Get the format string
    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::BuiltIn(id) => Self::builtin_format_string(*id),
            NumberFormat::Custom(s) => s,
        }
    }

    fn builtin_format_string(id: u32) -> &'static str {
        match id {
            0 => "General",
            1 => "0",
            2 => "0.00",
            3 => "#,##0",
            4 => "#,##0.00",
            9 => "0%",
            10 => "0.00%",
            11 => "0.00E+00",
            12 => "# ?/?",
            13 => "# ??/??",
            14 => "mm-dd-yy",
            15 => "d-mmm-yy",
            16 => "d-mmm",
            17 => "mmm-yy",
            18 => "h:mm AM/PM",
            19 => "h:mm:ss AM/PM",
            20 => "h:mm",
            21 => "h:mm:ss",
            22 => "m/d/yy h:mm",
            37 => "#,##0 ;(#,##0)",
            38 => "#,##0 ;[Red](#,##0)",
            39 => "#,##0.00;(#,##0.00)",
            40 => "#,##0.00;[Red](#,##0.00)",
            45 => "mm:ss",
            46 => "[h]:mm:ss",
            47 => "mmss.0",
            48 => "##0.0E+0",
            49 => "@",
            _ => "General",
        }
    }

    /// Check if this format stores its content as text (`@`)
    pub fn is_text_format(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => *id == Self::ID_TEXT,
            NumberFormat::Custom(s) => s.trim() == "@",
            NumberFormat::General => false,
        }
    }

    /// Check if this is a date/time format
    pub fn is_date_format(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => {
                matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
            }
            NumberFormat::Custom(s) => custom_has_date_tokens(s),
            NumberFormat::General => false,
        }
    }
}

/// Date/time letters outside quoted literals, escapes and `[...]` sections
fn custom_has_date_tokens(format: &str) -> bool {
    let mut chars = format.chars();
    let mut in_quotes = false;
    let mut in_brackets = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '\\' => {
                chars.next();
            }
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            // elapsed time sections like [h] are still time formats
            'h' | 'H' if in_brackets => return true,
            _ if in_brackets => {}
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_format() {
        assert!(NumberFormat::BuiltIn(49).is_text_format());
        assert!(NumberFormat::from_string("@").is_text_format());
        assert!(!NumberFormat::General.is_text_format());
        assert!(!NumberFormat::from_string("0.00").is_text_format());
    }

    #[test]
    fn test_date_format_detection() {
        assert!(NumberFormat::BuiltIn(14).is_date_format());
        assert!(NumberFormat::BuiltIn(22).is_date_format());
        assert!(!NumberFormat::BuiltIn(2).is_date_format());
        assert!(NumberFormat::from_string("dd.mm.yyyy").is_date_format());
        assert!(NumberFormat::from_string("[h]:mm").is_date_format());
        assert!(!NumberFormat::from_string("0.00\" days\"").is_date_format());
        assert!(!NumberFormat::from_string("[Red]#,##0.00").is_date_format());
        assert!(!NumberFormat::General.is_date_format());
    }

    #[test]
    fn test_format_string() {
        assert_eq!(NumberFormat::from_string("0.00"), NumberFormat::BuiltIn(2));
        assert_eq!(NumberFormat::BuiltIn(2).format_string(), "0.00");
        assert_eq!(NumberFormat::from_id(0), NumberFormat::General);
        assert_eq!(
            NumberFormat::from_string("0.000").format_string(),
            "0.000"
        );
    }
}
