use hostwatch_config::Thresholds;
use hostwatch_types::{AlertEvent, AlertLevel};

/// 渲染后的邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// 渲染告警邮件
///
/// 升级事件以目标级别为标题前缀，回落事件统一为 `[RECOVERED]`。
/// `thresholds` 为空时（例如热加载后该指标已移除）正文不带阈值。
pub fn render(event: &AlertEvent, thresholds: Option<&Thresholds>) -> RenderedMessage {
    let time = event.occurred_at.format("%Y-%m-%d %H:%M:%S UTC");

    if event.is_escalation() {
        let subject = format!(
            "[{}] server {} {} alert",
            event.to_level.as_str().to_uppercase(),
            event.server_name,
            event.metric_kind
        );
        let mut body = format!(
            "Server {} {} usage is {:.1}%",
            event.server_name, event.metric_kind, event.value
        );
        if let Some(cutoff) = thresholds.and_then(|t| t.cutoff(event.to_level)) {
            body.push_str(&format!(
                ", above the {} threshold {:.1}%",
                event.to_level, cutoff
            ));
        }
        body.push_str(&format!(
            ".\n\nLevel: {} -> {}\nTime: {}",
            event.from_level, event.to_level, time
        ));
        return RenderedMessage { subject, body };
    }

    let subject = format!(
        "[RECOVERED] server {} {} back to {}",
        event.server_name, event.metric_kind, event.to_level
    );
    let mut body = format!(
        "Server {} {} usage dropped to {:.1}%",
        event.server_name, event.metric_kind, event.value
    );
    // 仍高于 Normal 时给出当前级别的阈值
    if event.to_level != AlertLevel::Normal {
        if let Some(cutoff) = thresholds.and_then(|t| t.cutoff(event.to_level)) {
            body.push_str(&format!(", still above the {} threshold {:.1}%", event.to_level, cutoff));
        }
    }
    body.push_str(&format!(
        ".\n\nLevel: {} -> {}\nTime: {}",
        event.from_level, event.to_level, time
    ));
    RenderedMessage { subject, body }
}
