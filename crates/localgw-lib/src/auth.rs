use std::fmt;

use serde::{Deserialize, Serialize};

/// Authorization attached to a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    #[default]
    None,
    Jwt,
    AwsIam,
    /// Request-style custom authorizer.
    Custom,
    CustomToken,
    CustomRequest,
    CognitoUserPools,
}

impl AuthType {
    pub const ALL: [AuthType; 7] = [
        AuthType::None,
        AuthType::Jwt,
        AuthType::AwsIam,
        AuthType::Custom,
        AuthType::CustomToken,
        AuthType::CustomRequest,
        AuthType::CognitoUserPools,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuthType::None => "NONE",
            AuthType::Jwt => "JWT",
            AuthType::AwsIam => "AWS_IAM",
            AuthType::Custom => "CUSTOM",
            AuthType::CustomToken => "CUSTOM_TOKEN",
            AuthType::CustomRequest => "CUSTOM_REQUEST",
            AuthType::CognitoUserPools => "COGNITO_USER_POOLS",
        }
    }

    /// Case-insensitive match against the enumeration names.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|auth| auth.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload shape the route is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// REST API (payload format 1.0).
    #[serde(rename = "APIGW")]
    Apigw,
    /// HTTP API (payload format 2.0).
    #[serde(rename = "APIGW_V2")]
    ApigwV2,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Apigw => "APIGW",
            EventType::ApigwV2 => "APIGW_V2",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
