//! 환경 변수 기반 설정 관리

use std::env;
use std::path::PathBuf;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// 비어 있으면 모든 origin 허용
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub session: SessionConfig,
}

/// 협업 세션 설정
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `<name>.bpmn` 템플릿 덮어쓰기 디렉터리
    pub template_dir: Option<PathBuf>,
    pub max_user_name_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            log_level: "info".to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            max_user_name_len: 100,
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: parse_origins(&env::var("CORS_ORIGINS").unwrap_or_default()),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            session: SessionConfig {
                template_dir: env::var("TEMPLATE_DIR")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
                max_user_name_len: env::var("MAX_USER_NAME_LEN")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.session.max_user_name_len),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `*` 또는 빈 값은 전체 허용(빈 목록)으로 취급
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && *s != "*")
        .map(|s| s.to_string())
        .collect()
}
