use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FfpipeError::composition("x")
            .to_string()
            .contains("composition error:")
    );
    assert!(
        FfpipeError::graph("x")
            .to_string()
            .contains("filtergraph error:")
    );
    assert!(FfpipeError::not_running("x").to_string().contains("not running:"));
    assert!(FfpipeError::not_found("x").to_string().contains("not found:"));
    assert!(FfpipeError::timeout("x").to_string().contains("timed out:"));
    assert!(
        FfpipeError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(FfpipeError::ffmpeg("x").to_string().contains("ffmpeg error:"));
}

#[test]
fn kind_predicates_are_distinct() {
    assert!(FfpipeError::timeout("x").is_timeout());
    assert!(!FfpipeError::timeout("x").is_not_found());
    assert!(FfpipeError::not_running("x").is_not_running());
    assert!(!FfpipeError::not_found("x").is_not_running());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FfpipeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));

    let io: FfpipeError = std::io::Error::other("pipe closed").into();
    assert!(io.to_string().contains("pipe closed"));
}
