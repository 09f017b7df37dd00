#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand_core::OsRng;
    use x25519_dalek::StaticSecret;

    use crate::envelope::{open, seal, Envelope, Purpose, Suite, MIN_ENVELOPE_LEN};
    use crate::keys::{agree_static, PublicKeyBytes};
    use crate::master_key::MasterKey;
    use crate::transcript::Transcript;
    use crate::CryptoError;

    fn suite_strategy() -> impl Strategy<Value = Suite> {
        prop_oneof![Just(Suite::ChaCha20Poly1305), Just(Suite::Aes256Gcm)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn transcript_is_deterministic(
            tag1 in any::<u32>(),
            data1 in any::<Vec<u8>>(),
            tag2 in any::<u32>(),
            data2 in any::<Vec<u8>>()
        ) {
            let mut t1 = Transcript::new("prop");
            t1.append_bytes(tag1, &data1).append_bytes(tag2, &data2);
            let mut t2 = Transcript::new("prop");
            t2.append_bytes(tag1, &data1).append_bytes(tag2, &data2);
            prop_assert_eq!(t1.as_bytes(), t2.as_bytes());
        }

        #[test]
        fn sealed_envelopes_open(
            suite in suite_strategy(),
            plaintext in proptest::collection::vec(any::<u8>(), 0..2048)
        ) {
            let sk = StaticSecret::random_from_rng(OsRng);
            let pk = PublicKeyBytes::from(&sk);

            let bytes = seal(suite, Purpose::Message, &pk, &plaintext).unwrap().to_bytes();
            prop_assert_eq!(bytes.len(), MIN_ENVELOPE_LEN + plaintext.len());
            prop_assert_eq!(bytes[0], suite.byte());

            let env = Envelope::from_bytes(&bytes).unwrap();
            let shared = agree_static(&sk, &env.ephemeral_key().unwrap()).unwrap();
            prop_assert_eq!(open(&env, Purpose::Message, &pk, &shared).unwrap(), plaintext);
        }

        #[test]
        fn truncation_never_authenticates(
            plaintext in proptest::collection::vec(any::<u8>(), 1..256),
            cut in 1usize..64
        ) {
            let sk = StaticSecret::random_from_rng(OsRng);
            let pk = PublicKeyBytes::from(&sk);
            let bytes = seal(Suite::default(), Purpose::Message, &pk, &plaintext).unwrap().to_bytes();
            let cut = cut.min(bytes.len() - 1);
            let truncated = &bytes[..bytes.len() - cut];

            match Envelope::from_bytes(truncated) {
                Err(CryptoError::MalformedEnvelope(_)) => {}
                Ok(env) => {
                    let shared = agree_static(&sk, &env.ephemeral_key().unwrap()).unwrap();
                    prop_assert_eq!(
                        open(&env, Purpose::Message, &pk, &shared),
                        Err(CryptoError::AuthenticationFailed)
                    );
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        #[test]
        fn unknown_version_bytes_rejected(
            version in any::<u8>().prop_filter("known suite", |v| *v != 0x01 && *v != 0x02),
            rest in proptest::collection::vec(any::<u8>(), 0..128)
        ) {
            let mut bytes = vec![version];
            bytes.extend_from_slice(&rest);
            prop_assert_eq!(
                Envelope::from_bytes(&bytes),
                Err(CryptoError::UnsupportedVersion(version))
            );
        }

        #[test]
        fn master_key_length_is_exact(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
            let res = MasterKey::from_slice(&bytes);
            if bytes.len() == 32 {
                let key = res.unwrap();
                prop_assert_eq!(key.as_bytes().as_slice(), bytes.as_slice());
            } else {
                let is_length_error = matches!(res, Err(CryptoError::InvalidKeyLength { .. }));
                prop_assert!(is_length_error);
            }
        }

        #[test]
        fn public_key_parse_accepts_only_32_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..80)) {
            let res = PublicKeyBytes::try_from(bytes.as_slice());
            if bytes.len() != 32 {
                let is_peer_key_error = matches!(res, Err(CryptoError::InvalidPeerKey(_)));
                prop_assert!(is_peer_key_error);
            }
        }
    }
}
