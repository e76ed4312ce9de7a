use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} label '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Closed set of labelled variants carried on the wire as plain strings.
///
/// The first label is canonical and is what gets serialized; any extra
/// labels are accepted on input only (the legacy deployment used Russian
/// labels).
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    other => Err(UnknownLabel {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

labeled_enum!(
    Priority {
        Critical => "Critical" | "Критический",
        High => "High" | "Высокий",
        Medium => "Medium" | "Средний",
        Low => "Low" | "Низкий",
    }
);

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

labeled_enum!(
    IncidentStatus {
        New => "New" | "Новый",
        Assigned => "Assigned" | "Назначен",
        InProgress => "In Progress" | "В работе",
        Pending => "Pending" | "Ожидание",
        Resolved => "Resolved" | "Решен",
        Closed => "Closed" | "Закрыт",
    }
);

impl IncidentStatus {
    /// Resolved and closed incidents no longer count as open and always
    /// count as meeting their SLA.
    pub fn is_terminal(self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }
}

labeled_enum!(
    Category {
        Hardware => "Hardware" | "Оборудование",
        Software => "Software" | "ПО",
        Network => "Network" | "Сеть",
        Access => "Access" | "Доступ",
    }
);

labeled_enum!(
    RequestStatus {
        New => "New" | "Новая",
        InProgress => "In Progress" | "В работе",
        Completed => "Completed" | "Выполнена",
        Closed => "Closed" | "Закрыта",
        Rejected => "Rejected" | "Отклонена",
    }
);

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Closed | RequestStatus::Rejected
        )
    }
}

labeled_enum!(
    CiType {
        Server => "Server" | "Сервер",
        Application => "Application" | "Приложение",
        Network => "Network" | "Сеть",
        Workstation => "Workstation" | "Рабочая станция",
        Other => "Other" | "Другое",
    }
);

labeled_enum!(
    CiStatus {
        Active => "Active" | "Активен",
        InRepair => "In Repair" | "В ремонте",
        Decommissioned => "Decommissioned" | "Списан",
    }
);

labeled_enum!(
    /// Top-level sections of the portal.
    Module {
        Dashboard => "dashboard",
        Incidents => "incidents",
        Cmdb => "cmdb",
        Problems => "problems",
        Requests => "requests",
        Changes => "changes",
        Knowledge => "knowledge",
        Users => "users",
        Integrations => "integrations",
    }
);

impl Default for Module {
    fn default() -> Self {
        Module::Dashboard
    }
}

/// Remote collections the portal reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Incidents,
    Requests,
    Cmdb,
    Stats,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Resource::Incidents => "/incidents",
            Resource::Requests => "/requests",
            Resource::Cmdb => "/cmdb",
            Resource::Stats => "/stats",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Resource::Incidents => "incidents",
            Resource::Requests => "requests",
            Resource::Cmdb => "cmdb",
            Resource::Stats => "stats",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Module {
    /// Resources that must be loaded when this module becomes active.
    pub fn required_resources(self) -> &'static [Resource] {
        match self {
            Module::Dashboard => &[
                Resource::Incidents,
                Resource::Requests,
                Resource::Cmdb,
                Resource::Stats,
            ],
            Module::Incidents => &[Resource::Incidents],
            Module::Requests => &[Resource::Requests],
            Module::Cmdb => &[Resource::Cmdb],
            Module::Problems
            | Module::Changes
            | Module::Knowledge
            | Module::Users
            | Module::Integrations => &[],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Module::Dashboard => "Dashboard",
            Module::Incidents => "Incidents",
            Module::Cmdb => "CMDB",
            Module::Problems => "Problems",
            Module::Requests => "Requests",
            Module::Changes => "Changes",
            Module::Knowledge => "Knowledge",
            Module::Users => "Users",
            Module::Integrations => "Integrations",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_labels_decode_to_canonical_variants() {
        let priority: Priority = serde_json::from_str("\"Критический\"").expect("priority");
        assert_eq!(priority, Priority::Critical);
        assert_eq!(serde_json::to_string(&priority).expect("json"), "\"Critical\"");

        let status: IncidentStatus = serde_json::from_str("\"В работе\"").expect("status");
        assert_eq!(status, IncidentStatus::InProgress);
        assert_eq!(status.as_str(), "In Progress");
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "Urgent".parse::<Priority>().expect_err("must fail");
        assert_eq!(err.kind, "Priority");
        assert!(serde_json::from_str::<Category>("\"Printers\"").is_err());
    }

    #[test]
    fn only_dashboard_needs_stats() {
        for module in Module::ALL {
            let needs_stats = module.required_resources().contains(&Resource::Stats);
            assert_eq!(needs_stats, *module == Module::Dashboard, "{module}");
        }
    }

    #[test]
    fn placeholder_modules_need_nothing() {
        for module in [
            Module::Problems,
            Module::Changes,
            Module::Knowledge,
            Module::Users,
            Module::Integrations,
        ] {
            assert!(module.required_resources().is_empty());
        }
    }
}
