//! Schema registry
//!
//! One static schema per [`NodeType`].

use std::sync::LazyLock;

use super::{ConfigFieldSpec, FieldType, InputSlotSpec, NodeSchema};
use crate::domain::node::NodeType;

const RESOLUTIONS: [&str; 2] = ["720p", "1080p"];

static ASSET: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::Asset)
        .field(
            ConfigFieldSpec::string("media_type")
                .required()
                .one_of(["video", "audio", "image", "text"]),
        )
        .field(ConfigFieldSpec::string("label"))
});

static GENERATE_VOICEOVER: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::GenerateVoiceover)
        .input(InputSlotSpec::single("script"))
        .field(ConfigFieldSpec::string("voice_id").required())
        .field(ConfigFieldSpec::string("text").required())
        .field(ConfigFieldSpec::string("model"))
        .field(ConfigFieldSpec::integer("speed"))
});

static GENERATE_TALKING_HEAD: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::GenerateTalkingHead)
        .input(InputSlotSpec::single("audio").required())
        .input(InputSlotSpec::single("avatar_image"))
        .field(ConfigFieldSpec::string("avatar_id").required())
        .field(ConfigFieldSpec::string("resolution").one_of(RESOLUTIONS))
        .field(ConfigFieldSpec::string("background"))
});

static GENERATE_ANIMATION: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::GenerateAnimation)
        .input(InputSlotSpec::multiple("reference_images", 0, Some(4)))
        .field(ConfigFieldSpec::string("prompt").required())
        .field(ConfigFieldSpec::integer("duration_seconds").required())
        .field(ConfigFieldSpec::string("style"))
        .field(ConfigFieldSpec::boolean("loop"))
});

static RENDER_CODE: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::RenderCode)
        .input(InputSlotSpec::single("narration"))
        .field(ConfigFieldSpec::string("code").required())
        .field(ConfigFieldSpec::string("language").required())
        .field(ConfigFieldSpec::string("theme").one_of(["dark", "light"]))
});

static MIX_AUDIO: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::MixAudio)
        .input(InputSlotSpec::multiple("tracks", 1, Some(8)))
        .field(ConfigFieldSpec::boolean("normalize"))
        .field(ConfigFieldSpec::new("volumes", FieldType::Array))
});

static MERGE_VIDEOS: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::MergeVideos)
        .input(InputSlotSpec::multiple("segments", 2, Some(50)))
        .field(ConfigFieldSpec::string("transition").one_of(["none", "crossfade", "fade"]))
});

static COMPOSE_VIDEO: LazyLock<NodeSchema> = LazyLock::new(|| {
    NodeSchema::new(NodeType::ComposeVideo)
        .input(InputSlotSpec::single("video").required())
        .input(InputSlotSpec::single("audio"))
        .input(InputSlotSpec::multiple("overlays", 0, Some(10)))
        .field(
            ConfigFieldSpec::string("resolution")
                .required()
                .one_of(["720p", "1080p", "4k"]),
        )
        .field(ConfigFieldSpec::integer("fps"))
        .field(ConfigFieldSpec::new("captions", FieldType::Object))
});

/// Schema for a known node type
pub fn schema_for(node_type: NodeType) -> &'static NodeSchema {
    match node_type {
        NodeType::Asset => &*ASSET,
        NodeType::GenerateVoiceover => &*GENERATE_VOICEOVER,
        NodeType::GenerateTalkingHead => &*GENERATE_TALKING_HEAD,
        NodeType::GenerateAnimation => &*GENERATE_ANIMATION,
        NodeType::RenderCode => &*RENDER_CODE,
        NodeType::MixAudio => &*MIX_AUDIO,
        NodeType::MergeVideos => &*MERGE_VIDEOS,
        NodeType::ComposeVideo => &*COMPOSE_VIDEO,
    }
}

/// Schema for a raw type string, `None` if the type is not recognized
pub fn lookup(node_type: &str) -> Option<&'static NodeSchema> {
    node_type.parse().ok().map(schema_for)
}
