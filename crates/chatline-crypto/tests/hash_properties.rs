//! Property-based tests for salted password hashing

use chatline_crypto::{PasswordHash, SALT_LEN, Salt, hash_password};
use proptest::prelude::*;

fn arbitrary_salt() -> impl Strategy<Value = Salt> {
    any::<[u8; SALT_LEN]>().prop_map(Salt::from_bytes)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: the password that produced a digest always verifies against it
    #[test]
    fn prop_hash_verifies_own_password(password in ".{0,64}", salt in arbitrary_salt()) {
        let hash = hash_password(&password, &salt);
        prop_assert!(hash.verify(&password, &salt));
    }

    /// Property: a different password never verifies
    #[test]
    fn prop_other_password_rejected(
        password in "[a-z]{1,32}",
        other in "[a-z]{1,32}",
        salt in arbitrary_salt()
    ) {
        prop_assume!(password != other);
        let hash = hash_password(&password, &salt);
        prop_assert!(!hash.verify(&other, &salt));
    }

    /// Property: stored hex forms decode to the same salt and digest
    #[test]
    fn prop_stored_form_is_stable(password in ".{0,32}", salt in arbitrary_salt()) {
        let hash = hash_password(&password, &salt);

        prop_assert_eq!(Salt::from_hex(&salt.to_hex()), Ok(salt));
        prop_assert_eq!(PasswordHash::from_hex(&hash.to_hex()), Ok(hash));
    }
}
