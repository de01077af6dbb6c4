//! 다이어그램 템플릿 카탈로그
//!
//! 기본 내장 BPMN 템플릿을 메모리에 올려두고, 선택적으로 `TEMPLATE_DIR`의
//! `<name>.bpmn` 파일로 덮어쓴다. 조회는 I/O 없이 메모리에서만 수행된다.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 선택 가능한 템플릿
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    #[default]
    Blank,
    SimpleProcess,
    ApprovalWorkflow,
    CrossFunctional,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::Blank,
        Template::SimpleProcess,
        Template::ApprovalWorkflow,
        Template::CrossFunctional,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Template::Blank => "blank",
            Template::SimpleProcess => "simple-process",
            Template::ApprovalWorkflow => "approval-workflow",
            Template::CrossFunctional => "cross-functional",
        }
    }

    /// 연결 쿼리 파라미터 해석. 없거나 알 수 없는 이름은 기본 템플릿.
    pub fn from_param(param: Option<&str>) -> Self {
        param
            .and_then(|name| name.trim().parse().ok())
            .unwrap_or_default()
    }

    fn builtin(self) -> &'static str {
        match self {
            Template::Blank => include_str!("../templates/blank.bpmn"),
            Template::SimpleProcess => include_str!("../templates/simple-process.bpmn"),
            Template::ApprovalWorkflow => include_str!("../templates/approval-workflow.bpmn"),
            Template::CrossFunctional => include_str!("../templates/cross-functional.bpmn"),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| TemplateError::Unknown(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown template '{0}'")]
    Unknown(String),

    #[error("Error loading template '{name}' from {path}: {source}")]
    Io {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template directory {0} does not exist")]
    MissingDir(PathBuf),
}

/// 템플릿 이름 → BPMN XML
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    documents: HashMap<Template, String>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    /// 내장 템플릿만 사용
    pub fn builtin() -> Self {
        Self {
            documents: Template::ALL
                .into_iter()
                .map(|t| (t, t.builtin().to_string()))
                .collect(),
        }
    }

    /// 디렉터리의 `<name>.bpmn` 파일로 내장 템플릿을 덮어쓴다.
    /// 파일이 없으면 내장 템플릿을 유지한다.
    pub fn load(dir: Option<&Path>) -> Result<Self, TemplateError> {
        let mut catalog = Self::builtin();
        let Some(dir) = dir else {
            return Ok(catalog);
        };

        if !dir.is_dir() {
            return Err(TemplateError::MissingDir(dir.to_path_buf()));
        }

        for template in Template::ALL {
            let path = template_path(dir, template);
            if !path.exists() {
                continue;
            }
            let xml = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                name: template.name(),
                path: path.clone(),
                source,
            })?;
            tracing::info!(template = %template, path = %path.display(), "Template override loaded");
            catalog.documents.insert(template, xml);
        }

        Ok(catalog)
    }

    pub fn document(&self, template: Template) -> &str {
        self.documents
            .get(&template)
            .map(String::as_str)
            .unwrap_or_else(|| template.builtin())
    }

    /// 세션 리셋 시 복원되는 기본 문서
    pub fn default_document(&self) -> &str {
        self.document(Template::default())
    }
}

pub fn template_path(dir: &Path, template: Template) -> PathBuf {
    dir.join(format!("{}.bpmn", template.name()))
}
