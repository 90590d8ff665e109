use justconfig::error::ConfigError;
use justconfig::item::{MapAction, StringItem};

/// Strips one pair of surrounding double quotes from configuration values.
///
/// Values without quotes are kept as they are, so `k = 40` and `k = "40"` read the same.
pub trait Unquote
where
    Self: Sized,
{
    fn unquote(self) -> Result<StringItem, ConfigError>;
}

impl Unquote for Result<StringItem, ConfigError> {
    fn unquote(self) -> Result<StringItem, ConfigError> {
        self?.map(|raw| {
            match raw.trim().strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
                Some(inner) => MapAction::Replace(vec![inner.to_owned()]),
                None => MapAction::Keep,
            }
        })
    }
}

/// Normalizes enumeration-like values such as `similarity = "Pearson"`.
///
/// Trims, unquotes and lowercases, so the value can be matched against a fixed set of names.
pub trait NormalizeName
where
    Self: Sized,
{
    fn normalize_name(self) -> Result<StringItem, ConfigError>;
}

impl NormalizeName for Result<StringItem, ConfigError> {
    fn normalize_name(self) -> Result<StringItem, ConfigError> {
        self.unquote()?.map(|raw| {
            let normalized = raw.trim().to_ascii_lowercase();
            if normalized == *raw {
                MapAction::Keep
            } else {
                MapAction::Replace(vec![normalized])
            }
        })
    }
}
