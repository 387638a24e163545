use mealkiosk::engine::normalize_token;
use mealkiosk::receipt::format_amount;
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalized_token_has_no_surrounding_whitespace(raw in "\\PC{0,64}") {
        let token = normalize_token(&raw, "MEAL:");
        prop_assert_eq!(token.trim(), token.as_str());
    }

    #[test]
    fn prefix_is_stripped_exactly_once(body in "[A-Z0-9-]{1,32}") {
        let raw = format!("  MEAL:{}  ", body);
        prop_assert_eq!(normalize_token(&raw, "MEAL:"), body);
    }

    #[test]
    fn unprefixed_tokens_pass_through(body in "[A-Z0-9-]{1,32}") {
        prop_assert_eq!(normalize_token(&body, "MEAL:"), body);
    }

    #[test]
    fn amount_formatting_keeps_two_decimals(minor in 0i64..10_000_000) {
        let text = format_amount(minor);
        let (_, cents) = text.split_once('.').expect("missing decimal point");
        prop_assert_eq!(cents.len(), 2);
    }
}
