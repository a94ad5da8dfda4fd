use serde::Serialize;

use planos_core::notifications::{Notification, NotificationKind, Recipient};

/// A rendered message addressed to a single recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: Recipient,
    pub subject: String,
    pub body: String,
}

/// Expands a workflow notification into one email per recipient.
pub fn render(notification: &Notification) -> Vec<OutboundEmail> {
    notification
        .recipients
        .iter()
        .map(|recipient| OutboundEmail {
            to: recipient.clone(),
            subject: subject_line(notification),
            body: body_text(notification, recipient),
        })
        .collect()
}

fn subject_line(notification: &Notification) -> String {
    let event = &notification.event_name;
    match &notification.kind {
        NotificationKind::ApprovalFlowStarted => {
            format!("Solicitud en revisión: {event}")
        }
        NotificationKind::StatusUpdate { group_name, returned_for_review, .. } => {
            if *returned_for_review {
                format!("Documentos devueltos para corrección: {event}")
            } else {
                format!("Solicitud pendiente de revisión por {group_name}: {event}")
            }
        }
        NotificationKind::FinalApproval { .. } => {
            format!("Solicitud aprobada: {event}")
        }
    }
}

fn body_text(notification: &Notification, recipient: &Recipient) -> String {
    let mut lines = vec![format!("Hola {},", recipient.name), String::new()];

    match &notification.kind {
        NotificationKind::ApprovalFlowStarted => {
            lines.push(format!(
                "Su solicitud \"{}\" ({}) fue recibida y entró al flujo de aprobación.",
                notification.event_name,
                notification.request_id.as_str()
            ));
            lines.push(
                "El área de sostenibilidad revisará los documentos del evento como primer paso."
                    .to_string(),
            );
        }
        NotificationKind::StatusUpdate { group_name, returned_for_review, reason, .. } => {
            if *returned_for_review {
                lines.push(format!(
                    "La solicitud \"{}\" ({}) fue devuelta a {} para corrección de documentos.",
                    notification.event_name,
                    notification.request_id.as_str(),
                    group_name
                ));
                if let Some(reason) = reason {
                    lines.push(String::new());
                    lines.push(format!("Motivo del rechazo: {reason}"));
                }
            } else {
                lines.push(format!(
                    "La solicitud \"{}\" ({}) está pendiente de revisión por {}.",
                    notification.event_name,
                    notification.request_id.as_str(),
                    group_name
                ));
            }
        }
        NotificationKind::FinalApproval { plan_links } => {
            lines.push(format!(
                "La solicitud \"{}\" ({}) fue aprobada por todas las áreas.",
                notification.event_name,
                notification.request_id.as_str()
            ));
            if !plan_links.is_empty() {
                lines.push(String::new());
                lines.push("Planos aprobados:".to_string());
                for link in plan_links {
                    lines.push(format!("  - {}: {}", link.name, link.url));
                }
            }
        }
    }

    lines.push(String::new());
    lines.push("Centro de Convenciones".to_string());
    lines.join("\n")
}
