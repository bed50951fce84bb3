use erddap_fs::{NormalizedPath, validate_file_name};
use rstest::rstest;

#[test]
fn test_normalize_backslashes_to_forward() {
    let path = NormalizedPath::new("datasets.d\\ocean\\buoy.xml");
    assert_eq!(path.as_str(), "datasets.d/ocean/buoy.xml");
}

#[test]
fn test_join_paths() {
    let base = NormalizedPath::new("/erddapData");
    assert_eq!(base.join("erddap/hardFlag").as_str(), "/erddapData/erddap/hardFlag");
}

#[test]
fn test_join_with_trailing_slash() {
    let base = NormalizedPath::new("/erddapData/");
    assert_eq!(base.join("erddap").as_str(), "/erddapData/erddap");
}

#[test]
fn test_file_name() {
    let path = NormalizedPath::new("datasets.d/010-base.xml");
    assert_eq!(path.file_name(), Some("010-base.xml"));
}

#[test]
fn test_file_name_ignores_trailing_slash() {
    let path = NormalizedPath::new("/erddapData/erddap/hardFlag/");
    assert_eq!(path.file_name(), Some("hardFlag"));
}

#[rstest]
#[case("cruise_2020")]
#[case("buoy1")]
#[case("erdMHchla8day")]
fn test_valid_file_names(#[case] name: &str) {
    assert!(validate_file_name(name).is_ok());
}

#[rstest]
#[case("")]
#[case(".")]
#[case("..")]
#[case("a/b")]
#[case("a\\b")]
#[case("nul\0byte")]
fn test_invalid_file_names(#[case] name: &str) {
    assert!(validate_file_name(name).is_err());
}
