use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

/// Process configuration of the standalone host, read from the environment.
#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "1")]
    pub tool_id: u32,

    /// Path to the JSON tool configuration blob.
    pub tool_config_path: NonEmptyString,

    /// JSON-lines records to stream through the tool. Without it the tool runs once
    /// with no incoming connection.
    pub input_path: Option<String>,

    #[envconfig(default = "output")]
    pub output_dir: String,

    /// Below zero for no limit, zero to only validate, above zero to cap the records read.
    #[envconfig(default = "-1")]
    pub record_limit: i64,

    #[envconfig(default = "30000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(default = "Download Tool")]
    pub user_agent: String,

    #[envconfig(default = "false")]
    pub dry_run: bool,

    #[envconfig(default = "262144")]
    pub max_response_body: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let env = HashMap::from([(
            "TOOL_CONFIG_PATH".to_owned(),
            "/etc/download/tool.json".to_owned(),
        )]);
        let config = Config::init_from_hashmap(&env).unwrap();

        assert_eq!(config.tool_config_path.as_str(), "/etc/download/tool.json");
        assert_eq!(config.input_path, None);
        assert_eq!(config.record_limit, -1);
        assert_eq!(config.request_timeout.0, time::Duration::from_secs(30));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_tool_config_path_is_required() {
        assert!(Config::init_from_hashmap(&HashMap::new()).is_err());

        let env = HashMap::from([("TOOL_CONFIG_PATH".to_owned(), String::new())]);
        assert!(Config::init_from_hashmap(&env).is_err());
    }

    #[test]
    fn test_parse_ms_duration() {
        assert_eq!(
            "1500".parse::<EnvMsDuration>().unwrap().0,
            time::Duration::from_millis(1500)
        );
        assert_eq!(
            "soon".parse::<EnvMsDuration>().unwrap_err(),
            ParseEnvMsDurationError
        );
    }
}
