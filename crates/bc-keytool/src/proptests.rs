//! Property-based tests for bc-keytool

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::config::{CliOverrides, KeytoolConfig};
    use crate::output::{armor, dearmor, parse_hex, OutputFormat, OutputFormatter};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // CLI values always win over file values.
        #[test]
        fn test_override_precedence(
            file_timeout in 1u64..1000,
            cli_timeout in proptest::option::of(1u64..1000),
            memory in any::<bool>(),
        ) {
            let mut config = KeytoolConfig::default();
            config.limits.timeout_seconds = file_timeout;

            let overrides = CliOverrides {
                backend: memory.then(|| "memory".to_string()),
                timeout_seconds: cli_timeout,
                ..Default::default()
            };
            let resolved = config.with_overrides(&overrides);

            prop_assert_eq!(resolved.limits.timeout_seconds, cli_timeout.unwrap_or(file_timeout));
            prop_assert_eq!(resolved.keystore.backend == "memory", memory);
            prop_assert!(resolved.validate().is_ok());
        }

        // Error output stays valid JSON whatever the message contains.
        #[test]
        fn test_json_errors_always_parse(message in ".*", command in "[a-z ]{1,20}") {
            let formatter = OutputFormatter::new(OutputFormat::Json);
            let out = formatter.format_error("MALFORMED_INPUT", &message, &command);
            let value: serde_json::Value = serde_json::from_str(&out).unwrap();
            prop_assert_eq!(value["error"].as_str(), Some(message.as_str()));
            prop_assert_eq!(value["success"].as_bool(), Some(false));
        }

        // Armored payloads survive line wrapping at any width.
        #[test]
        fn test_dearmor_ignores_line_breaks(
            bytes in proptest::collection::vec(any::<u8>(), 0..256),
            width in 1usize..80,
        ) {
            let encoded = armor(&bytes);
            let wrapped: String = encoded
                .as_bytes()
                .chunks(width)
                .map(|c| format!("{}\n", String::from_utf8_lossy(c)))
                .collect();
            prop_assert_eq!(dearmor(wrapped.as_bytes()).unwrap(), bytes);
        }

        #[test]
        fn test_hex_prefix_is_optional(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let plain = hex::encode(&bytes);
            prop_assert_eq!(parse_hex(&plain).unwrap(), bytes.clone());
            prop_assert_eq!(parse_hex(&format!("0x{plain}")).unwrap(), bytes);
        }
    }
}
