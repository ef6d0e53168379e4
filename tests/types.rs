// ABOUTME: Integration tests for validated identifiers and value types.
// ABOUTME: Tests image references, service names, version labels, and ids.

use skipper::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_bare_repository() {
        let img = ImageRef::parse("ghcr.io/acme/langgraph").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "acme/langgraph");
        assert!(img.tag().is_none());
        assert!(img.is_bare());
    }

    #[test]
    fn parse_with_tag() {
        let img = ImageRef::parse("ghcr.io/acme/langgraph:v1.0.1").unwrap();
        assert_eq!(img.tag(), Some("v1.0.1"));
        assert!(img.digest().is_none());
    }

    #[test]
    fn parse_registry_with_port() {
        let img = ImageRef::parse("localhost:5000/mcpserver").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "mcpserver");
        assert!(img.tag().is_none());
    }

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("ghcr.io/acme/langgraph:v1@sha256:abc123").unwrap();
        assert_eq!(img.repository(), "ghcr.io/acme/langgraph");
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest(), Some("sha256:abc123"));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("invalid image!").is_err());
        assert!(ImageRef::parse("ghcr.io/acme/langgraph:").is_err());
        assert!(ImageRef::parse("ghcr.io/acme/langgraph@abc").is_err());
    }

    #[test]
    fn with_tag_drops_digest() {
        let img = ImageRef::parse("ghcr.io/acme/langgraph:v1@sha256:abc").unwrap();
        assert_eq!(
            img.with_tag("v2").to_string(),
            "ghcr.io/acme/langgraph:v2"
        );
    }

    #[test]
    fn pinned_keeps_tag_for_readability() {
        let img = ImageRef::parse("ghcr.io/acme/langgraph:v1.0.1").unwrap();
        let pinned = img.pinned("sha256:abc");
        assert_eq!(pinned.to_string(), "ghcr.io/acme/langgraph:v1.0.1@sha256:abc");
        assert_eq!(pinned.unpinned(), img);
    }
}

mod service_name_tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert_eq!(ServiceName::new("langgraph").unwrap().as_str(), "langgraph");
        assert!(ServiceName::new("mcp-server2").is_ok());
        assert!(ServiceName::new(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(ServiceName::new("").is_err());
        assert!(ServiceName::new(&"a".repeat(64)).is_err());
        assert!(ServiceName::new("-langgraph").is_err());
        assert!(ServiceName::new("langgraph-").is_err());
        assert!(ServiceName::new("LangGraph").is_err());
        assert!(ServiceName::new("lang_graph").is_err());
    }

    #[test]
    fn default_env_key_is_upper_snake() {
        let name = ServiceName::new("mcp-server").unwrap();
        assert_eq!(name.default_env_key(), "MCP_SERVER_IMAGE");
    }
}

mod version_label_tests {
    use super::*;

    #[test]
    fn accepts_optional_v_prefix() {
        let with = VersionLabel::parse("v1.0.1").unwrap();
        let without = VersionLabel::parse("1.0.1").unwrap();
        assert_eq!(with, without);
        assert_eq!(with.tag_name(), "v1.0.1");
    }

    #[test]
    fn accepts_prerelease() {
        let label = VersionLabel::parse("v2.0.0-rc.1").unwrap();
        assert_eq!(label.tag_name(), "v2.0.0-rc.1");
    }

    #[test]
    fn rejects_non_semver_and_build_metadata() {
        assert!(VersionLabel::parse("").is_err());
        assert!(VersionLabel::parse("latest").is_err());
        assert!(VersionLabel::parse("v1.0").is_err());
        assert!(VersionLabel::parse("v1.0.0+build5").is_err());
    }

    #[test]
    fn ordering_is_semantic() {
        let a = VersionLabel::parse("v1.9.0").unwrap();
        let b = VersionLabel::parse("v1.10.0").unwrap();
        assert!(a < b);
    }

    #[test]
    fn next_patch_drops_prerelease() {
        let label = VersionLabel::parse("v1.0.1-rc.2").unwrap();
        assert_eq!(label.next_patch().unwrap().tag_name(), "v1.0.2");
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::generate(), BatchId::generate());
        assert_eq!(BatchId::generate().as_str().len(), 32);
    }

    #[test]
    fn commit_short_form() {
        let commit = CommitId::new("0123456789abcdef0123456789abcdef01234567");
        assert_eq!(commit.short(), "0123456789ab");
        assert_eq!(CommitId::new("abc").short(), "abc");
    }
}
