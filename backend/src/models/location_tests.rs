use super::*;

fn mid(n: i64) -> Location {
    Location::middle(n).unwrap()
}

fn key(s: &str) -> Location {
    s.parse().unwrap()
}

#[test]
fn test_sentinels_bound_every_middle() {
    let big = Location::middle_big(BigUint::from(u64::MAX) << 200u32).unwrap();
    for loc in [mid(1), mid(1_000_000), big, key("0.0078125")] {
        assert!(Location::Beginning < loc);
        assert!(loc < Location::End);
    }
    assert!(Location::Beginning < Location::End);
}

#[test]
fn test_middle_rejects_non_positive() {
    assert_eq!(
        Location::middle(0),
        Err(LocationError::NonPositive("0".to_string()))
    );
    assert!(matches!(
        Location::middle(-3),
        Err(LocationError::NonPositive(_))
    ));
    assert!(Location::middle_big(BigUint::default()).is_err());
}

#[test]
fn test_middle_ordering_by_value() {
    assert!(mid(1) < mid(2));
    assert!(key("1.5") < mid(2));
    assert!(mid(1) < key("1.5"));
    assert!(key("1.25") < key("1.5"));
    assert_eq!(key("2.0").cmp(&mid(2)), Ordering::Equal);
}

#[test]
fn test_normal_form_makes_equal_values_identical() {
    assert_eq!(key("2.50"), key("2.5"));
    assert_eq!(key("4.000"), mid(4));
    assert_eq!(key("4.000").to_string(), "4");
}

#[test]
fn test_display_is_exact_decimal() {
    assert_eq!(mid(7).to_string(), "7");
    assert_eq!(key("0.5").to_string(), "0.5");
    assert_eq!(key("1.625").to_string(), "1.625");
    assert_eq!(key("0.0078125").to_string(), "0.0078125");
    assert_eq!(Location::Beginning.to_string(), "beginning");
    assert_eq!(Location::End.to_string(), "end");
}

#[test]
fn test_parse_rejects_malformed_and_non_dyadic() {
    for bad in ["", "abc", "1.", ".5", "-1", "1.2.3", "0.1", "2.3"] {
        assert!(bad.parse::<Location>().is_err(), "accepted '{}'", bad);
    }
    assert!(matches!(
        "0.000".parse::<Location>(),
        Err(LocationError::NonPositive(_))
    ));
}

#[test]
fn test_serde_uses_text_form() {
    let json = serde_json::to_string(&key("3.75")).unwrap();
    assert_eq!(json, "\"3.75\"");
    let back: Location = serde_json::from_str(&json).unwrap();
    assert_eq!(back, key("3.75"));
    assert!(serde_json::from_str::<Location>("\"0.3\"").is_err());
}

#[test]
fn test_find_zero_is_empty() {
    assert!(Location::find(0, &mid(1), &mid(2)).unwrap().is_empty());
    assert!(Location::find(0, &Location::Beginning, &Location::End)
        .unwrap()
        .is_empty());
}

#[test]
fn test_find_rejects_empty_range() {
    assert!(matches!(
        Location::find(1, &mid(3), &mid(3)),
        Err(LocationError::EmptyRange { .. })
    ));
    assert!(Location::find(1, &mid(4), &mid(3)).is_err());
    assert!(Location::find(0, &Location::End, &Location::Beginning).is_err());
    assert!(Location::find(2, &Location::End, &Location::End).is_err());
}

#[test]
fn test_find_between_sentinels_yields_whole_numbers() {
    let found = Location::find(3, &Location::Beginning, &Location::End).unwrap();
    assert_eq!(found, vec![mid(1), mid(2), mid(3)]);
}

#[test]
fn test_find_after_last_step_continues_past_floor() {
    let found = Location::find(2, &key("2.5"), &Location::End).unwrap();
    assert_eq!(found, vec![mid(3), mid(4)]);
}

#[test]
fn test_find_between_adjacent_integers_refines() {
    let found = Location::find(3, &mid(1), &mid(2)).unwrap();
    assert_eq!(found.len(), 3);
    assert!(mid(1) < found[0]);
    assert!(found.windows(2).all(|w| w[0] < w[1]));
    assert!(found[2] < mid(2));
    assert!(found.iter().all(|l| !matches!(l, Location::Middle(p) if p.is_integer())));
}

#[test]
fn test_find_spreads_across_wide_gap() {
    let found = Location::find(2, &mid(1), &mid(9)).unwrap();
    assert_eq!(found, vec![mid(3), mid(5)]);
}

#[test]
fn test_find_before_first_step() {
    let found = Location::find(2, &Location::Beginning, &mid(1)).unwrap();
    assert_eq!(found.len(), 2);
    assert!(found[0] < found[1]);
    assert!(found[1] < mid(1));
}

#[test]
fn test_repeated_insertion_never_runs_out_of_room() {
    let lower = mid(1);
    let mut upper = mid(2);
    for _ in 0..200 {
        let found = Location::find(1, &lower, &upper).unwrap();
        assert!(lower < found[0] && found[0] < upper);
        upper = found[0].clone();
    }
    let text = upper.to_string();
    assert_eq!(text.parse::<Location>().unwrap(), upper);
}
