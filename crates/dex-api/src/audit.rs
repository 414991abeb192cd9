//! Security audit logging for authentication events
//!
//! Every login, registration, token rejection and access-control failure is
//! recorded as an [`AuditEvent`]. Events are logged at INFO level with the
//! "audit" target so they can be filtered and routed separately from
//! application logs.
//!
//! Audit records never contain passwords, password hashes or token values.
//!
//! # Example
//!
//! ```ignore
//! use dex_api::audit::{AuditEvent, audit_log};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     username: user.username.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: None,
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful login
    LoginSuccess {
        user_id: Uuid,
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Session cookie cleared
    Logout { ip_address: Option<String> },

    /// Successful registration
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        role: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Missing, malformed, expired or unknown-principal token
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },

    /// Authenticated principal lacks the required role or ownership
    AccessDenied {
        user_id: Option<Uuid>,
        username: Option<String>,
        resource: String,
        required_role: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Request rejected by the CSRF check
    CsrfRejected {
        user_id: Option<Uuid>,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Principal removed by an administrator
    UserDeleted {
        actor_id: Uuid,
        target_id: Uuid,
        ip_address: Option<String>,
    },
}

/// Log a security audit event with structured fields
///
/// The full event is also serialized to JSON in the `event` field, for
/// example:
///
/// ```json
/// {
///   "event_type": "login_failure",
///   "username": "alice",
///   "reason": "invalid credentials",
///   "ip_address": "192.168.1.1",
///   "user_agent": null
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            user_id,
            username,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            username,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::Logout { ip_address } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                "User logout"
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            username,
            role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                role = %role,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            username,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::InvalidToken {
            ip_address, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                reason = %reason,
                "Invalid token"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            username,
            resource,
            required_role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                username = ?username,
                resource = %resource,
                required_role = ?required_role,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::CsrfRejected {
            user_id,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                reason = %reason,
                ip_address = ?ip_address,
                "CSRF check failed"
            );
        }
        AuditEvent::UserDeleted {
            actor_id,
            target_id,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                actor_id = %actor_id,
                target_id = %target_id,
                ip_address = ?ip_address,
                "User deleted"
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop) then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn test_event_serialization_tag() {
        let event = AuditEvent::LoginFailure {
            username: "alice".to_string(),
            reason: "invalid credentials".to_string(),
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "login_failure");
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_csrf_event_tag() {
        let event = AuditEvent::CsrfRejected {
            user_id: None,
            reason: "missing token".to_string(),
            ip_address: None,
            user_agent: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "csrf_rejected");

        // Must not panic without a subscriber
        audit_log(&event);
    }

    #[test]
    fn test_extract_ip_from_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        assert_eq!(extract_ip_address(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_extract_ip_from_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        assert_eq!(extract_ip_address(&headers).as_deref(), Some("10.0.0.2"));
        assert_eq!(extract_ip_address(&HeaderMap::new()), None);
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user_agent(&headers), None);

        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("curl/8.0"),
        );
        assert_eq!(extract_user_agent(&headers).as_deref(), Some("curl/8.0"));
    }
}
