use super::*;

#[test]
fn bare_name_and_id() {
    assert_eq!(compose_filter("hflip", &[], None, &[]), "hflip");
    assert_eq!(compose_filter("hflip", &[], Some("f0"), &[]), "hflip@f0");
}

#[test]
fn positional_then_keyed() {
    let f = Filter::new("scale").arg(200).arg(220).opt("flags", "bicubic");
    assert_eq!(f.compose(), "scale=200:220:flags=bicubic");
}

#[test]
fn lists_and_booleans() {
    let f = Filter::new("split")
        .opt("outputs", vec![1, 2, 3])
        .opt("eval", true);
    assert_eq!(f.compose(), "split=outputs=1|2|3:eval=true");
}

#[test]
fn two_level_escaping() {
    let f = Filter::new("drawtext").opt("text", "a:b");
    // level 1: a\:b, quoted; level 2 doubles the backslash
    assert_eq!(f.compose(), r"drawtext=text='a\\:b'");

    let f = Filter::new("drawtext").opt("text", "x,y");
    assert_eq!(f.compose(), r"drawtext=text='x\,y'");
}

#[test]
fn decompose_recovers_plain_filter() {
    let f = Filter::new("scale")
        .id("s1")
        .arg(200)
        .arg("iw/2")
        .opt("flags", "bicubic")
        .opt("eval", false);
    let parsed = parse_filter(&f.compose()).unwrap();
    assert_eq!(parsed.name, "scale");
    assert_eq!(parsed.id.as_deref(), Some("s1"));
    let pos: Vec<String> = parsed.positional.iter().map(|v| v.to_arg_string()).collect();
    assert_eq!(pos, vec!["200", "iw/2"]);
    assert_eq!(parsed.get("flags").unwrap().to_arg_string(), "bicubic");
    assert_eq!(parsed.get("eval").unwrap().to_arg_string(), "false");
}

#[test]
fn decompose_recovers_escaped_values() {
    let f = Filter::new("drawtext")
        .opt("text", "it's 10:30, [live]")
        .opt("fontsize", 24);
    let parsed = parse_filter(&f.compose()).unwrap();
    assert_eq!(
        parsed.get("text").unwrap().to_arg_string(),
        "it's 10:30, [live]"
    );
    assert_eq!(parsed.get("fontsize").unwrap().to_arg_string(), "24");
}

#[test]
fn decompose_rejects_missing_name_and_bad_order() {
    assert!(parse_filter("=1:2").is_err());
    assert!(parse_filter("scale=w=1:2").is_err());
    assert_eq!(parse_filter("null").unwrap(), Filter::new("null"));
}
