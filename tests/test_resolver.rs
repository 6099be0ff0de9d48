//! Resolution against the built-in registry

use rtimg::core::resolver::synthesize_path;
use rtimg::{FallbackTags, LegacyPosterFactory, Registry, Resolver, RtimgError, TagSourceFactory};
use std::path::{Path, PathBuf};

#[test]
fn test_builtin_registry_shape() {
    let registry = Registry::builtin();
    assert_eq!(registry.lookup("./logo.png").unwrap().byte_limit, 1_000_000);
    assert_eq!(registry.lookup("./350x500.jpg").unwrap().byte_limit, -1);
    assert_eq!(
        registry.lookup("./для сервиса/600x600.jpg").unwrap().byte_limit,
        700_000
    );
    assert_eq!(
        registry.lookup("./для сервиса/1920x1080_left.psd").unwrap().byte_limit,
        -1
    );
    assert!(registry.recognizes(Path::new("x/A.JPG")));
    assert!(registry.recognizes(Path::new("x/a.psd")));
    assert!(!registry.recognizes(Path::new("x/a.gif")));
}

#[test]
fn test_google_apple_feed_project_info() {
    let r = Resolver::builtin()
        .try_resolve(
            "some/path/PROJECT_NAME/google_apple_feed/jpg/g_iconic_poster_600x800.jpg",
            None,
        )
        .unwrap();
    assert_eq!(r.policy().family, "gp");
    assert_eq!(r.policy().byte_limit, 2_000_000);
    assert_eq!(r.level(), 2);
    assert_eq!(r.project_directory(), "some/path/PROJECT_NAME");
    assert_eq!(r.project_name(), Some("PROJECT_NAME"));
}

#[test]
fn test_unicode_directory_project_info() {
    let r = Resolver::builtin()
        .try_resolve("some/path/PROJECT_NAME/для сервиса/600x600.jpg", None)
        .unwrap();
    assert_eq!(r.suffix(), "./для сервиса/600x600.jpg");
    assert_eq!(r.project_directory(), "some/path/PROJECT_NAME");
    assert_eq!(r.project_name(), Some("PROJECT_NAME"));
}

#[test]
fn test_flat_family_at_leaf() {
    let r = Resolver::builtin()
        .try_resolve("/srv/posters/abc/rt/525x300.jpg", None)
        .unwrap();
    assert_eq!(r.policy().family, "rt");
    assert_eq!(r.level(), 0);
    assert_eq!(r.project_directory(), "/srv/posters/abc/rt");
    assert_eq!(r.project_name(), Some("rt"));
}

#[test]
fn test_psd_sibling_is_unconstrained() {
    let r = Resolver::builtin()
        .try_resolve("P/google_apple_feed/psd/g_iconic_poster_600x800.psd", None)
        .unwrap();
    assert!(!r.policy().is_constrained());
}

#[test]
fn test_unknown_and_malformed() {
    let resolver = Resolver::builtin();
    assert!(matches!(
        resolver.try_resolve("a/b/123x456.jpg", None),
        Err(RtimgError::PolicyNotFound { .. })
    ));
    assert!(matches!(
        resolver.try_resolve("a/b/cover.jpg", None),
        Err(RtimgError::MalformedLeaf { matches: 0, .. })
    ));
}

#[test]
fn test_legacy_poster_fallback() {
    let path = Path::new("/posters/x123/hd_2016_3d_moana__ru_poster1620x996.jpg");
    let tags = LegacyPosterFactory.build(path);
    assert!(tags.is_present());

    let synthetic = synthesize_path(tags.source().unwrap()).unwrap();
    assert_eq!(synthetic, PathBuf::from("/posters/x123/1620x996.jpg"));

    let r = Resolver::builtin().resolve(path, &tags).unwrap();
    assert!(r.used_fallback());
    assert_eq!(r.policy().family, "rt");
    assert_eq!(r.project_name(), Some("moana_2016_hd"));
    assert_eq!(r.project_directory(), "/posters/x123");
}

#[test]
fn test_invalid_tags_return_literal_error() {
    let path = Path::new("/posters/x123/cover.jpg");
    let tags = LegacyPosterFactory.build(path);
    assert!(matches!(tags, FallbackTags::Invalid { .. }));
    assert!(matches!(
        Resolver::builtin().resolve(path, &tags),
        Err(RtimgError::MalformedLeaf { .. })
    ));
}
