use osm_wrangle::{
    normalize::{AddressField, AddressNormalizer},
    rules::NormalizationRules,
    street::{StreetSuffixCanonicalizer, SuffixOutcome, trailing_suffix},
};
use proptest::prelude::*;

fn normalize(field: &str, value: &str) -> String {
    let rules = NormalizationRules::default();
    AddressNormalizer::new(&rules)
        .expect("normalizer")
        .normalize(field, value)
        .into_owned()
}

#[test]
fn state_scenarios() {
    assert_eq!(normalize("state", "ca"), "CA");
    assert_eq!(normalize("state", "Ca"), "CA");
    assert_eq!(normalize("state", "Oregon"), "Oregon");
}

#[test]
fn postcode_scenarios() {
    assert_eq!(normalize("postcode", "CA94123"), "94123");
    assert_eq!(
        normalize("postcode", "123 Main St, Oakland CA 94611"),
        "94611"
    );
}

#[test]
fn field_names_map_to_closed_rule_set() {
    assert_eq!(AddressField::from_field_name("postcode"), AddressField::Postcode);
    assert_eq!(AddressField::from_field_name("state"), AddressField::State);
    assert_eq!(AddressField::from_field_name("street"), AddressField::Street);
    assert_eq!(AddressField::from_field_name("Street"), AddressField::Other);
    assert_eq!(AddressField::from_field_name("housenumber"), AddressField::Other);
}

#[test]
fn custom_tables_can_be_injected() {
    let rules = NormalizationRules::from_yaml_str(
        "suffix_mapping:\n  Hwy: Highway\nexpected_suffixes: [Highway]\npostcode:\n  prefixes: [\"97\"]\nstate:\n  canonical: OR\n  aliases: [Oregon]\n",
    )
    .expect("rules");
    let normalizer = AddressNormalizer::new(&rules).expect("normalizer");
    assert_eq!(normalizer.normalize("street", "Coast Hwy"), "Coast Highway");
    assert_eq!(normalizer.normalize("street", "Main St"), "Main St");
    assert_eq!(normalizer.normalize("state", "Oregon"), "OR");
    assert_eq!(normalizer.normalize("state", "ca"), "ca");
    assert_eq!(normalizer.normalize("postcode", "97201"), "97201");
    assert_eq!(normalizer.normalize("postcode", "CA97201"), "97201");
}

#[test]
fn unrecognized_suffix_is_reported_not_rewritten() {
    let rules = NormalizationRules::default();
    let canonicalizer = StreetSuffixCanonicalizer::new(&rules);
    assert_eq!(
        canonicalizer.classify("Avenida Sur"),
        SuffixOutcome::Unrecognized("Sur")
    );
    assert_eq!(canonicalizer.canonicalize("Avenida Sur"), "Avenida Sur");
}

fn mapped_suffix() -> impl Strategy<Value = String> {
    let keys = NormalizationRules::default()
        .suffix_mapping
        .into_keys()
        .collect::<Vec<_>>();
    proptest::sample::select(keys)
}

fn expected_suffix() -> impl Strategy<Value = String> {
    let suffixes = NormalizationRules::default()
        .expected_suffixes
        .into_iter()
        .collect::<Vec<_>>();
    proptest::sample::select(suffixes)
}

proptest! {
    #[test]
    fn valid_postcodes_are_identity(code in "9[45][0-9]{3}") {
        prop_assert_eq!(normalize("postcode", &code), code);
    }

    #[test]
    fn region_prefixed_postcodes_keep_trailing_digits(digits in "[0-9]{5}") {
        prop_assert_eq!(normalize("postcode", &format!("CA{digits}")), digits);
    }

    #[test]
    fn only_trailing_suffix_occurrence_is_rewritten(
        prefix in "[A-Z][a-z]{2,8}( [A-Z][a-z]{2,8}){0,2}",
        suffix in mapped_suffix(),
    ) {
        let rules = NormalizationRules::default();
        let street = format!("{suffix} {prefix} {suffix}");
        let expected_full = rules.canonical_suffix(&suffix).expect("mapped").to_string();
        let rewritten = normalize("street", &street);
        prop_assert_eq!(rewritten, format!("{suffix} {prefix} {expected_full}"));
    }

    #[test]
    fn expected_suffixes_are_left_alone(
        prefix in "[A-Z][a-z]{2,8}( [A-Z][a-z]{2,8}){0,2}",
        suffix in expected_suffix(),
    ) {
        let street = format!("{prefix} {suffix}");
        let once = normalize("street", &street);
        prop_assert_eq!(&once, &street);
        prop_assert_eq!(normalize("street", &once), once.clone());
    }

    #[test]
    fn normalizing_streets_is_idempotent(street in "[A-Za-z. ]{0,24}") {
        let once = normalize("street", &street);
        prop_assert_eq!(normalize("street", &once), once);
    }

    #[test]
    fn trailing_suffix_is_a_suffix_of_the_input(street in "[A-Za-z0-9. ]{1,24}") {
        if let Some(token) = trailing_suffix(&street) {
            prop_assert!(street.ends_with(token));
            prop_assert!(!token.contains(' '));
        }
    }

    #[test]
    fn unknown_fields_pass_through(field in "[a-z_]{1,12}", value in ".{0,20}") {
        prop_assume!(!matches!(field.as_str(), "postcode" | "state" | "street"));
        prop_assert_eq!(normalize(&field, &value), value);
    }
}
