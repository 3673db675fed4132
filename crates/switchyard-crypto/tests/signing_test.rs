use chrono::Duration;
use proptest::prelude::*;
use switchyard_crypto::{IssuedUser, KeyManager, Role, TokenCodec};
use uuid::Uuid;

fn codec() -> TokenCodec {
    TokenCodec::new(
        KeyManager::generate().unwrap(),
        Duration::minutes(15),
        Duration::hours(168),
    )
}

proptest! {
    #[test]
    fn issued_pairs_round_trip_for_any_user(
        email in "[a-z]{1,10}@[a-z]{1,10}\\.com",
        role_idx in 0u8..4,
    ) {
        let role = match role_idx {
            0 => Role::Admin,
            1 => Role::Developer,
            2 => Role::Viewer,
            _ => Role::Superadmin,
        };
        let codec = codec();
        let user = IssuedUser { id: Uuid::new_v4(), email, role, projects: vec![] };

        let pair = codec.issue_token_pair(&user).unwrap();
        let access = codec.validate_access(&pair.access_token).unwrap();
        let refresh = codec.validate_refresh(&pair.refresh_token).unwrap();

        prop_assert_eq!(access.session_id, refresh.session_id);
        prop_assert!(codec.validate_access(&pair.refresh_token).is_err());
        prop_assert!(codec.validate_refresh(&pair.access_token).is_err());
    }
}
