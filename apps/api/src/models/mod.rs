pub mod agent;
pub mod application;
pub mod audit;
pub mod candidate;
pub mod job;
pub mod user;

/// Declares a text-backed enumeration stored in a `TEXT` column.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` and serde impls using the
/// snake_case wire names given in the declaration.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(format!(
                        "'{}' is not a valid {}",
                        other,
                        stringify!($name)
                    )),
                }
            }
        }
    };
}

pub(crate) use string_enum;

/// Parses a stored enum column, falling back to `default` for unknown values.
pub fn parse_or<T: std::str::FromStr>(raw: &str, default: T) -> T {
    raw.parse().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    string_enum! {
        pub enum Shade {
            Light => "light",
            DarkBlue => "dark_blue",
        }
    }

    #[test]
    fn test_all_lists_variants_in_declaration_order() {
        assert_eq!(Shade::ALL, &[Shade::Light, Shade::DarkBlue]);
        let wire: Vec<&str> = Shade::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(wire, vec!["light", "dark_blue"]);
    }

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(parse_or("dark_blue", Shade::Light), Shade::DarkBlue);
        assert_eq!(parse_or("purple", Shade::Light), Shade::Light);
    }
}
