//! `define_port_error!` builds port error enums with snake_case constructors.
//!
//! Each variant gets a constructor taking `impl Into<T>` per field, and the
//! enum gets `variant_name()` for logging and test assertions.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                ::paste::paste! {
                    #[doc = concat!("Build [`", stringify!($name), "::", stringify!($variant), "`].")]
                    pub fn [<$variant:snake>]($( $($field: impl Into<$ty>),* )?) -> Self {
                        Self::$variant $( { $($field: $field.into()),* } )?
                    }
                }
            )*

            /// Variant name, e.g. `"Connection"`.
            pub fn variant_name(&self) -> &'static str {
                match self {
                    $( Self::$variant { .. } => stringify!($variant), )*
                }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    define_port_error! {
        pub enum SamplePortError {
            Unavailable =>
                "sample port unavailable",
            Rejected { message: String } =>
                "sample rejected: {message}",
            Oversized { limit: u32 } =>
                "sample exceeded {limit} records",
            Partial { key: String, attempts: u32 } =>
                "sample {key} failed after {attempts} attempts",
        }
    }

    #[test]
    fn unit_variants_get_nullary_constructors() {
        assert_eq!(SamplePortError::unavailable(), SamplePortError::Unavailable);
    }

    #[test]
    fn string_fields_accept_borrowed_input() {
        let err = SamplePortError::rejected("bad tag");
        assert_eq!(err.to_string(), "sample rejected: bad tag");
    }

    #[test]
    fn non_string_fields_keep_their_type() {
        let err = SamplePortError::oversized(500_u32);
        assert_eq!(err.to_string(), "sample exceeded 500 records");
    }

    #[test]
    fn variant_names_match_declarations() {
        assert_eq!(SamplePortError::unavailable().variant_name(), "Unavailable");
        assert_eq!(SamplePortError::oversized(1_u32).variant_name(), "Oversized");
    }

    #[test]
    fn mixed_fields_are_positional() {
        let err = SamplePortError::partial("node/9", 3_u32);
        assert_eq!(err.to_string(), "sample node/9 failed after 3 attempts");
    }
}
