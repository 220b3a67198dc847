use crate::config::FeatureFlags;
use crate::types::AgentProfile;
use autodev_core::{NewTask, TaskPriority, TaskType};
use serde_json::json;

/// Agent profiles for every enabled task type.
pub fn default_profiles(features: &FeatureFlags) -> Vec<AgentProfile> {
    features
        .enabled_types()
        .into_iter()
        .map(profile_for)
        .collect()
}

pub fn profile_for(task_type: TaskType) -> AgentProfile {
    let (name, capabilities): (&str, &[&str]) = match task_type {
        TaskType::Research => (
            "Research Agent",
            &["market_analysis", "technology_research", "competitor_analysis"],
        ),
        TaskType::Frontend => (
            "Frontend Development Agent",
            &["react_development", "ui_components", "responsive_design"],
        ),
        TaskType::Backend => (
            "Backend Development Agent",
            &["api_development", "database_design", "business_logic"],
        ),
        TaskType::Database => (
            "Database Agent",
            &["schema_design", "optimization", "migrations"],
        ),
        TaskType::Testing => (
            "Testing Agent",
            &["unit_testing", "integration_testing", "e2e_testing"],
        ),
        TaskType::Deployment => (
            "Deployment Agent",
            &["ci_cd", "infrastructure", "monitoring"],
        ),
        TaskType::UiUx => (
            "UI/UX Design Agent",
            &["wireframing", "prototyping", "user_research"],
        ),
        TaskType::Portal => (
            "Portal Management Agent",
            &["user_management", "role_based_access", "dashboard_creation"],
        ),
        TaskType::Api => (
            "API Integration Agent",
            &["api_design", "integration", "documentation"],
        ),
        TaskType::Security => (
            "Security & Compliance Agent",
            &["security_audit", "compliance_check", "vulnerability_scan"],
        ),
    };

    AgentProfile {
        task_type,
        name: name.to_string(),
        capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
    }
}

/// One entry of the initial backlog. Dependencies are expressed by type and
/// resolved to ids of earlier seeds when the backlog is enqueued.
#[derive(Debug, Clone)]
pub struct SeedTask {
    pub task: NewTask,
    pub depends_on: Vec<TaskType>,
}

fn seed(
    task_type: TaskType,
    priority: TaskPriority,
    description: &str,
    requirements: serde_json::Value,
    hours: f64,
    depends_on: &[TaskType],
) -> SeedTask {
    SeedTask {
        task: NewTask::new(task_type, description)
            .with_priority(priority)
            .with_requirements(requirements)
            .with_estimated_duration(hours * 60.0),
        depends_on: depends_on.to_vec(),
    }
}

/// The initial development backlog, in an order where every dependency
/// precedes its dependents.
pub fn seed_tasks() -> Vec<SeedTask> {
    use TaskPriority::{Critical, High, Medium};
    use TaskType::*;

    vec![
        seed(
            Research,
            High,
            "Research latest TMS technologies and market trends",
            json!({"scope": "market_analysis", "timeframe": "1_week"}),
            168.0,
            &[],
        ),
        seed(
            Database,
            Critical,
            "Design comprehensive TMS database schema",
            json!({"entities": ["users", "shipments", "carriers", "customers", "financials"]}),
            48.0,
            &[],
        ),
        seed(
            Backend,
            High,
            "Develop core TMS API endpoints",
            json!({"endpoints": ["shipments", "users", "carriers", "analytics"]}),
            72.0,
            &[Database],
        ),
        seed(
            Frontend,
            High,
            "Build responsive TMS dashboard",
            json!({"framework": "react", "features": ["dashboard", "shipment_tracking", "analytics"]}),
            96.0,
            &[Backend],
        ),
        seed(
            UiUx,
            Medium,
            "Design user-friendly TMS interface",
            json!({"design_system": true, "accessibility": true, "mobile_first": true}),
            60.0,
            &[],
        ),
        seed(
            Portal,
            Medium,
            "Implement portal management system",
            json!({"roles": ["admin", "manager", "operator", "driver"], "features": ["user_management", "permissions"]}),
            84.0,
            &[Backend, Frontend],
        ),
        seed(
            Api,
            Medium,
            "Create API integration hub",
            json!({"integrations": ["carriers", "tracking", "payment", "notification"]}),
            72.0,
            &[Backend],
        ),
        seed(
            Security,
            Critical,
            "Implement security and compliance measures",
            json!({"standards": ["GDPR", "SOC2", "PCI"], "features": ["encryption", "audit_logs", "access_control"]}),
            96.0,
            &[Backend, Database],
        ),
        seed(
            Testing,
            High,
            "Comprehensive testing suite",
            json!({"coverage": 90, "types": ["unit", "integration", "e2e", "performance"]}),
            60.0,
            &[Frontend, Backend],
        ),
        seed(
            Deployment,
            High,
            "Automated deployment pipeline",
            json!({"environments": ["dev", "staging", "prod"], "ci_cd": true, "monitoring": true}),
            48.0,
            &[Testing],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_profiles_follow_flags() {
        let all = default_profiles(&FeatureFlags::all_enabled());
        assert_eq!(all.len(), 10);

        let some = default_profiles(&FeatureFlags::only(&[TaskType::Api, TaskType::Security]));
        assert_eq!(some.len(), 2);
        assert_eq!(some[0].agent_id(), "api-agent");
    }

    #[test]
    fn test_every_profile_has_capabilities() {
        for t in TaskType::ALL {
            let profile = profile_for(t);
            assert_eq!(profile.task_type, t);
            assert_eq!(profile.capabilities.len(), 3);
            assert!(!profile.name.is_empty());
        }
    }

    #[test]
    fn test_seed_backlog_is_topologically_ordered() {
        let seeds = seed_tasks();
        assert_eq!(seeds.len(), 10);
        let mut seen = HashSet::new();
        for s in &seeds {
            for dep in &s.depends_on {
                assert!(seen.contains(dep), "{} depends on later {}", s.task.task_type, dep);
            }
            seen.insert(s.task.task_type);
        }
    }

    #[test]
    fn test_seed_durations_in_minutes() {
        let seeds = seed_tasks();
        let research = &seeds[0].task;
        assert_eq!(research.task_type, TaskType::Research);
        assert_eq!(research.estimated_duration, 168.0 * 60.0);
    }
}
