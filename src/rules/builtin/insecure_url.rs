// U501: GitHub URLs over plain http

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::extractors::base::{truncate_chars, StructureMap};
use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, Severity};

static GITHUB_HTTP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)http://(?:www\.)?github\.com/[^\s'"<>]+"#).expect("valid github url regex")
});

static GITHUB_SUBDOMAIN_HTTP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)http://[a-zA-Z0-9-]+\.github\.(?:com|io)/[^\s'"<>]+"#)
        .expect("valid github subdomain regex")
});

const SNIPPET_CHARS: usize = 80;

pub struct InsecureGithubUrl {
    descriptor: DetectorDescriptor,
}

impl InsecureGithubUrl {
    pub fn new() -> Self {
        Self {
            descriptor: DetectorDescriptor::builtin(
                "U501",
                "GitHub URL uses insecure http:// protocol",
                RuleCategory::Urls,
                Severity::Low,
                &["*"],
            ),
        }
    }
}

impl Detector for InsecureGithubUrl {
    fn descriptor(&self) -> &DetectorDescriptor {
        &self.descriptor
    }

    fn detect(
        &self,
        path: &Path,
        _structure: &StructureMap,
        content: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let mut matches: Vec<regex::Match> = GITHUB_HTTP
                .find_iter(line)
                .chain(GITHUB_SUBDOMAIN_HTTP.find_iter(line))
                .collect();
            // www.github.com matches both patterns
            matches.sort_by_key(|m| m.start());
            matches.dedup_by_key(|m| m.start());

            for found in matches {
                let url = found.as_str();
                let secure = format!("https://{}", &url["http://".len()..]);
                let column = line[..found.start()].chars().count() as u32 + 1;
                findings.push(
                    self.descriptor
                        .finding(
                            path,
                            index as u32 + 1,
                            Some(format!("{}: {}", self.descriptor.message, url)),
                        )
                        .at_column(column)
                        .with_suggestion(format!("Use HTTPS: {}", secure))
                        .with_snippet(truncate_chars(line.trim(), SNIPPET_CHARS)),
                );
            }
        }
        Ok(findings)
    }
}
