//! 角色路由 - 为每个Agent角色选择可用的Provider与模型

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LLMConfig;
use crate::llm::client::{BackendFactory, ModelHandle};
use crate::llm::error::RouterError;
use crate::llm::rate_limiter::RateLimiter;
use crate::llm::registry::{
    Credentials, ProviderAvailability, ProviderDescriptor, ProviderKey, describe_providers,
    probe_availability,
};

/// 调研流水线中的Agent角色
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Researcher,
    Extractor,
    FactChecker,
    Summarizer,
    Writer,
    Analyst,
}

impl AgentRole {
    pub const ALL: [AgentRole; 7] = [
        AgentRole::Planner,
        AgentRole::Researcher,
        AgentRole::Extractor,
        AgentRole::FactChecker,
        AgentRole::Summarizer,
        AgentRole::Writer,
        AgentRole::Analyst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Researcher => "researcher",
            AgentRole::Extractor => "extractor",
            AgentRole::FactChecker => "fact_checker",
            AgentRole::Summarizer => "summarizer",
            AgentRole::Writer => "writer",
            AgentRole::Analyst => "analyst",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        AgentRole::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| RouterError::Configuration(format!("unknown agent role `{}`", s)))
    }
}

/// 单个角色的路由规则
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RoleRoute {
    /// 按优先顺序排列的Provider
    pub providers: Vec<ProviderKey>,
    pub temperature: f64,
}

impl RoleRoute {
    pub fn new(providers: impl Into<Vec<ProviderKey>>, temperature: f64) -> Self {
        Self {
            providers: providers.into(),
            temperature,
        }
    }
}

/// 角色到Provider偏好的映射表，配置文件中以角色名为键
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(
    try_from = "BTreeMap<String, RoleRoute>",
    into = "BTreeMap<String, RoleRoute>"
)]
pub struct RolePreference {
    routes: BTreeMap<AgentRole, RoleRoute>,
}

impl RolePreference {
    pub fn empty() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, role: AgentRole, route: RoleRoute) -> Self {
        self.routes.insert(role, route);
        self
    }

    pub fn route(&self, role: AgentRole) -> Option<&RoleRoute> {
        self.routes.get(&role)
    }
}

impl Default for RolePreference {
    /// 混合策略：速度敏感的角色走Groq，长上下文处理走Gemini
    fn default() -> Self {
        Self::empty()
            .with_route(AgentRole::Planner, RoleRoute::new([ProviderKey::Groq], 0.1))
            .with_route(AgentRole::Researcher, RoleRoute::new([ProviderKey::Groq], 0.3))
            .with_route(AgentRole::FactChecker, RoleRoute::new([ProviderKey::Groq], 0.1))
            .with_route(AgentRole::Writer, RoleRoute::new([ProviderKey::Groq], 0.7))
            .with_route(AgentRole::Extractor, RoleRoute::new([ProviderKey::Gemini], 0.1))
            .with_route(AgentRole::Summarizer, RoleRoute::new([ProviderKey::Gemini], 0.2))
            .with_route(
                AgentRole::Analyst,
                RoleRoute::new([ProviderKey::DeepSeek, ProviderKey::Groq], 0.3),
            )
    }
}

impl TryFrom<BTreeMap<String, RoleRoute>> for RolePreference {
    type Error = RouterError;

    fn try_from(raw: BTreeMap<String, RoleRoute>) -> Result<Self, Self::Error> {
        // 配置文件中的条目覆盖默认表中的同名角色
        let mut preference = RolePreference::default();
        for (name, route) in raw {
            let role = name.parse::<AgentRole>()?;
            preference.routes.insert(role, route);
        }
        Ok(preference)
    }
}

impl From<RolePreference> for BTreeMap<String, RoleRoute> {
    fn from(preference: RolePreference) -> Self {
        preference
            .routes
            .into_iter()
            .map(|(role, route)| (role.as_str().to_string(), route))
            .collect()
    }
}

/// 模型路由器，每次resolve都会重新按可用性选择Provider
pub struct ModelRouter {
    availability: ProviderAvailability,
    preferences: RolePreference,
    credentials: Credentials,
    llm: LLMConfig,
    factory: Arc<dyn BackendFactory>,
    limiter: Arc<RateLimiter>,
}

impl ModelRouter {
    /// 使用凭据快照判断可用性
    pub fn new(credentials: Credentials, llm: LLMConfig, factory: Arc<dyn BackendFactory>) -> Self {
        let availability = probe_availability(&credentials);
        let limiter = Arc::new(RateLimiter::from_config(&llm.rate_limit));
        Self {
            availability,
            preferences: llm.roles.clone(),
            credentials,
            llm,
            factory,
            limiter,
        }
    }

    /// 替换为深度探测的结果
    pub fn with_availability(mut self, availability: ProviderAvailability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_preferences(mut self, preferences: RolePreference) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn availability(&self) -> &ProviderAvailability {
        &self.availability
    }

    /// 选择Provider：先按角色偏好顺序，再回退到全局优先级最高的可用Provider
    pub fn select(
        &self,
        role: AgentRole,
    ) -> Result<(&'static ProviderDescriptor, f64), RouterError> {
        let route = self.preferences.route(role).ok_or_else(|| {
            RouterError::Configuration(format!("no provider preference configured for role `{}`", role))
        })?;

        if let Some(descriptor) = route
            .providers
            .iter()
            .find(|key| self.availability.is_available(**key))
            .map(|key| key.descriptor())
        {
            return Ok((descriptor, route.temperature));
        }

        match self.availability.available().first() {
            Some(descriptor) => {
                warn!(
                    role = %role,
                    provider = %descriptor.key,
                    "⚠️ 首选Provider均不可用，回退到全局可用Provider"
                );
                Ok((*descriptor, route.temperature))
            }
            None => Err(RouterError::NoProviderAvailable {
                role,
                hint: credential_hint(),
            }),
        }
    }

    /// 解析出可直接调用的模型句柄，temperature为None时使用角色默认值
    pub fn resolve(
        &self,
        role: AgentRole,
        temperature: Option<f64>,
    ) -> Result<ModelHandle, RouterError> {
        let (descriptor, default_temperature) = self.select(role)?;
        let model = self.llm.model_for(descriptor.key);
        let backend = self.factory.connect(
            descriptor.key,
            &model,
            self.credentials.get(descriptor.key),
        )?;

        debug!(role = %role, provider = %descriptor.key, model = %model, "角色路由完成");

        Ok(ModelHandle::new(
            descriptor.key,
            model,
            temperature.unwrap_or(default_temperature),
            Duration::from_secs(self.llm.timeout_seconds),
            backend,
            self.limiter.clone(),
        ))
    }
}

fn credential_hint() -> String {
    let names: Vec<&str> = describe_providers()
        .iter()
        .map(|descriptor| descriptor.credential_env)
        .collect();
    format!("set one of {}", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{Invocation, LanguageModel};
    use crate::llm::error::ModelError;
    use async_trait::async_trait;

    struct SilentModel;

    #[async_trait]
    impl LanguageModel for SilentModel {
        async fn invoke(&self, _invocation: &Invocation) -> Result<String, ModelError> {
            Ok("ok".to_string())
        }
    }

    struct StaticFactory;

    impl BackendFactory for StaticFactory {
        fn connect(
            &self,
            _provider: ProviderKey,
            _model: &str,
            _secret: Option<&str>,
        ) -> Result<Arc<dyn LanguageModel>, RouterError> {
            Ok(Arc::new(SilentModel))
        }
    }

    fn router_with(credentials: Credentials) -> ModelRouter {
        ModelRouter::new(credentials, LLMConfig::default(), Arc::new(StaticFactory))
    }

    #[test]
    fn test_preferred_provider_wins_when_available() {
        let router = router_with(
            Credentials::default()
                .with(ProviderKey::Groq, "gsk")
                .with(ProviderKey::Gemini, "g"),
        );

        let handle = router.resolve(AgentRole::Extractor, None).unwrap();
        assert_eq!(handle.provider(), ProviderKey::Gemini);
        assert_eq!(handle.model(), "gemini-1.5-flash");
        assert_eq!(handle.temperature(), 0.1);

        let handle = router.resolve(AgentRole::Writer, None).unwrap();
        assert_eq!(handle.provider(), ProviderKey::Groq);
        assert_eq!(handle.temperature(), 0.7);
    }

    #[test]
    fn test_secondary_preference_before_global_fallback() {
        let router = router_with(
            Credentials::default()
                .with(ProviderKey::Groq, "gsk")
                .with(ProviderKey::Gemini, "g"),
        );
        // analyst偏好deepseek然后groq，deepseek未配置
        let handle = router.resolve(AgentRole::Analyst, None).unwrap();
        assert_eq!(handle.provider(), ProviderKey::Groq);
    }

    #[test]
    fn test_fallback_to_highest_priority_available() {
        let router = router_with(
            Credentials::default()
                .with(ProviderKey::Anthropic, "sk-ant")
                .with(ProviderKey::OpenAI, "sk"),
        );

        for role in AgentRole::ALL {
            let handle = router.resolve(role, None).unwrap();
            assert_eq!(handle.provider(), ProviderKey::OpenAI, "role {}", role);
        }
    }

    #[test]
    fn test_no_provider_available_for_every_role() {
        let router = router_with(Credentials::default());
        for role in AgentRole::ALL {
            let err = router.resolve(role, None).unwrap_err();
            assert!(
                matches!(err, RouterError::NoProviderAvailable { role: r, .. } if r == role)
            );
        }
    }

    #[test]
    fn test_explicit_temperature_overrides_role_default() {
        let router = router_with(Credentials::default().with(ProviderKey::Groq, "gsk"));
        let handle = router.resolve(AgentRole::Writer, Some(0.0)).unwrap();
        assert_eq!(handle.temperature(), 0.0);
    }

    #[test]
    fn test_resolution_follows_availability_changes() {
        let router = router_with(
            Credentials::default()
                .with(ProviderKey::Groq, "gsk")
                .with(ProviderKey::Gemini, "g"),
        );
        let degraded = router.with_availability(ProviderAvailability::new([
            (ProviderKey::Groq, false),
            (ProviderKey::Gemini, true),
        ]));

        let handle = degraded.resolve(AgentRole::Researcher, None).unwrap();
        assert_eq!(handle.provider(), ProviderKey::Gemini);
    }

    #[test]
    fn test_unknown_role_is_configuration_error() {
        assert_eq!("fact-checker".parse::<AgentRole>().unwrap(), AgentRole::FactChecker);
        assert!(matches!(
            "astrologer".parse::<AgentRole>(),
            Err(RouterError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_role_route_is_configuration_error() {
        let router = router_with(Credentials::default().with(ProviderKey::Groq, "gsk"))
            .with_preferences(RolePreference::empty());
        assert!(matches!(
            router.resolve(AgentRole::Planner, None),
            Err(RouterError::Configuration(_))
        ));
    }

    #[test]
    fn test_role_table_from_toml_overrides_defaults() {
        let raw = r#"
            [writer]
            providers = ["anthropic", "groq"]
            temperature = 0.5
        "#;
        let preference: RolePreference = toml::from_str(raw).unwrap();
        assert_eq!(
            preference.route(AgentRole::Writer),
            Some(&RoleRoute::new([ProviderKey::Anthropic, ProviderKey::Groq], 0.5))
        );
        assert_eq!(
            preference.route(AgentRole::Extractor),
            Some(&RoleRoute::new([ProviderKey::Gemini], 0.1))
        );

        let bad = r#"
            [astrologer]
            providers = ["groq"]
            temperature = 0.5
        "#;
        assert!(toml::from_str::<RolePreference>(bad).is_err());
    }
}
