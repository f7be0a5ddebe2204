use serde::{Deserialize, Serialize};

/// Attributes of the subject (user, device, service) that flags are evaluated for.
///
/// The context is sent with every evaluation request. All attributes are optional; unset attributes
/// are omitted from the request. `custom` holds free-form attributes and is always sent.
///
/// # Examples
/// ```
/// # use edgeflags::EvaluationContext;
/// let context = EvaluationContext::new()
///     .user_id("user-42")
///     .plan("pro")
///     .segments(["beta", "internal"])
///     .custom("region", "eu-west-1");
/// assert_eq!(context.user_id.as_deref(), Some("user-42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Stable identifier of the subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Subscription plan, e.g. `free` or `pro`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// Segments the subject belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<String>>,
    /// Deployment environment, e.g. `production`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Free-form attributes.
    #[serde(default)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

impl EvaluationContext {
    /// Create an empty context.
    pub fn new() -> EvaluationContext {
        EvaluationContext::default()
    }

    /// Set the user id.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the email.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the phone number.
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Set the plan.
    pub fn plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    /// Set the segments, replacing any previous ones.
    pub fn segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments = Some(segments.into_iter().map(Into::into).collect());
        self
    }

    /// Set the environment.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set a single custom attribute, replacing any previous value under the same key.
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}
