// S701: Docker base images pinned to :latest or left untagged

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

use crate::extractors::base::StructureMap;
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};

static FROM_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*FROM\s+(?:--platform=\S+\s+)?(\S+)(?:\s+AS\s+(\S+))?")
        .expect("valid FROM regex")
});

pub struct DockerLatest {
    descriptor: DetectorDescriptor,
}

impl DockerLatest {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "S701",
                "Docker image uses :latest tag (pin to specific version)",
                RuleCategory::Security,
                Severity::Medium,
                &["Dockerfile", ".dockerfile", "Dockerfile.*", "Containerfile"],
            ),
        }
    }
}

enum ImageTag {
    Latest,
    Missing,
    Pinned,
}

/// Tag state of an image reference; a registry port is not a tag
fn image_tag(image: &str) -> ImageTag {
    if image.contains('@') {
        return ImageTag::Pinned;
    }
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    match last_segment.split_once(':') {
        Some((_, tag)) if tag.eq_ignore_ascii_case("latest") => ImageTag::Latest,
        Some(_) => ImageTag::Pinned,
        None => ImageTag::Missing,
    }
}

fn untagged_name(image: &str) -> &str {
    let slash = image.rfind('/').map_or(0, |i| i + 1);
    match image[slash..].find(':') {
        Some(colon) => &image[..slash + colon],
        None => image,
    }
}

impl Detector for DockerLatest {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        structure: &StructureMap,
        content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        // Stage names can be used as base images by later stages
        let mut stages: HashSet<String> = structure
            .get("stages")
            .iter()
            .filter_map(|stage| stage.extra_str("alias"))
            .map(str::to_ascii_lowercase)
            .collect();

        let mut findings = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let Some(captures) = FROM_LINE.captures(line) else {
                continue;
            };
            let image = captures.get(1).map_or("", |m| m.as_str());
            let lowered = image.to_ascii_lowercase();
            let skip = lowered == "scratch" || image.contains('$') || stages.contains(&lowered);
            if let Some(alias) = captures.get(2) {
                stages.insert(alias.as_str().to_ascii_lowercase());
            }
            if skip {
                continue;
            }

            let message = match image_tag(image) {
                ImageTag::Pinned => continue,
                ImageTag::Latest => format!("{}: {}", self.descriptor.message, image),
                ImageTag::Missing => {
                    format!("Docker image missing tag (defaults to :latest): {}", image)
                }
            };
            findings.push(
                self.descriptor
                    .finding(path, index as u32 + 1, Some(message))
                    .with_suggestion(format!(
                        "Pin to specific version: FROM {}:1.0.0",
                        untagged_name(image)
                    ))
                    .with_snippet(line.trim()),
            );
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCKERFILE: &str = "\
FROM --platform=linux/amd64 node:latest AS build
RUN npm ci
FROM build AS test
FROM registry.local:5000/team/api
FROM python:3.12-slim
FROM scratch
FROM ${BASE_IMAGE}
FROM alpine@sha256:0123abcd
FROM ubuntu
";

    #[test]
    fn test_latest_and_untagged_images() {
        let findings = DockerLatest::new()
            .detect(Path::new("Dockerfile"), &StructureMap::new(), DOCKERFILE)
            .unwrap();
        let lines: Vec<u32> = findings.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![1, 4, 9]);
        assert!(findings[0].message.ends_with("node:latest"));
        assert_eq!(
            findings[1].message,
            "Docker image missing tag (defaults to :latest): registry.local:5000/team/api"
        );
        assert_eq!(
            findings[0].suggestion.as_deref(),
            Some("Pin to specific version: FROM node:1.0.0")
        );
    }

    #[test]
    fn test_untagged_name_keeps_registry_port() {
        assert_eq!(untagged_name("registry.local:5000/api:latest"), "registry.local:5000/api");
        assert_eq!(untagged_name("ubuntu"), "ubuntu");
    }
}
