//! Executor types
//!
//! Each node type is handled by exactly one executor. The mapping is an
//! exhaustive match, so adding a node type without deciding how it runs does
//! not compile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::node::NodeType;

/// How an executor learns that its work finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Resolved before `execute` returns
    Synchronous,
    /// Provider is polled on a schedule until it reports a terminal status
    Polling,
    /// External compute posts the result back to the callback endpoint
    Callback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorType {
    Asset,
    TalkingHead,
    Voiceover,
    Animation,
    CodeRender,
    AudioMix,
    VideoMerge,
    VideoCompose,
}

impl ExecutorType {
    pub const ALL: [ExecutorType; 8] = [
        ExecutorType::Asset,
        ExecutorType::TalkingHead,
        ExecutorType::Voiceover,
        ExecutorType::Animation,
        ExecutorType::CodeRender,
        ExecutorType::AudioMix,
        ExecutorType::VideoMerge,
        ExecutorType::VideoCompose,
    ];

    pub fn for_node(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Asset => ExecutorType::Asset,
            NodeType::GenerateTalkingHead => ExecutorType::TalkingHead,
            NodeType::GenerateVoiceover => ExecutorType::Voiceover,
            NodeType::GenerateAnimation => ExecutorType::Animation,
            NodeType::RenderCode => ExecutorType::CodeRender,
            NodeType::MixAudio => ExecutorType::AudioMix,
            NodeType::MergeVideos => ExecutorType::VideoMerge,
            NodeType::ComposeVideo => ExecutorType::VideoCompose,
        }
    }

    pub fn delivery(&self) -> Delivery {
        match self {
            ExecutorType::Asset => Delivery::Synchronous,
            ExecutorType::TalkingHead | ExecutorType::Voiceover | ExecutorType::Animation => {
                Delivery::Polling
            }
            ExecutorType::CodeRender
            | ExecutorType::AudioMix
            | ExecutorType::VideoMerge
            | ExecutorType::VideoCompose => Delivery::Callback,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorType::Asset => "asset",
            ExecutorType::TalkingHead => "talking_head",
            ExecutorType::Voiceover => "voiceover",
            ExecutorType::Animation => "animation",
            ExecutorType::CodeRender => "code_render",
            ExecutorType::AudioMix => "audio_mix",
            ExecutorType::VideoMerge => "video_merge",
            ExecutorType::VideoCompose => "video_compose",
        }
    }

    /// Media type assumed for this executor's artifacts when none is reported
    pub fn default_media_type(&self) -> &'static str {
        match self {
            ExecutorType::Voiceover | ExecutorType::AudioMix => "audio/mpeg",
            ExecutorType::Asset => "application/octet-stream",
            _ => "video/mp4",
        }
    }
}

impl fmt::Display for ExecutorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown executor type: {0}")]
pub struct UnknownExecutorType(pub String);

impl FromStr for ExecutorType {
    type Err = UnknownExecutorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownExecutorType(s.to_string()))
    }
}
