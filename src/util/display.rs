//! Terminal output for scan progress and the portfolio view

use colored::Colorize;
use num_format::{Locale, ToFormattedString};

use crate::aggregate::PortfolioView;
use crate::config::DisplaySettings;
use crate::scanner::{JobState, MessageLevel, ScanProgress, StatusMessage};

/// `text` cut to `max_chars` characters, with an ellipsis when cut
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max_chars).collect();
        short.push('…');
        short
    }
}

/// `abcd…wxyz` for long addresses
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// `$1,234.56`
pub fn format_usd(value: f64) -> String {
    let total_cents = (value.abs() * 100.0).round();
    let sign = if value < 0.0 && total_cents > 0.0 { "-" } else { "" };
    let whole = (total_cents / 100.0).trunc() as u64;
    let cents = (total_cents % 100.0) as u64;
    format!("{}${}.{:02}", sign, whole.to_formatted_string(&Locale::en), cents)
}

fn signed_usd(value: f64) -> String {
    let text = if value >= 0.0 {
        format!("+{}", format_usd(value))
    } else {
        format_usd(value)
    };
    if value > 0.0 {
        text.green().to_string()
    } else if value < 0.0 {
        text.red().to_string()
    } else {
        text.normal().to_string()
    }
}

pub fn print_progress(progress: &ScanProgress) {
    let failed = progress
        .jobs
        .iter()
        .filter(|p| p.state == JobState::Failed)
        .count();
    let running: Vec<String> = progress
        .jobs
        .iter()
        .filter(|p| p.state == JobState::Running)
        .map(|p| short_address(&p.job.wallet))
        .collect();

    println!(
        "{} {}/{} wallets | {} failed | {}",
        "⏳".bright_yellow(),
        progress.finished,
        progress.total,
        failed,
        if running.is_empty() {
            "idle".to_string()
        } else {
            format!("loading {}", running.join(", "))
        }
    );
}

pub fn print_portfolio(view: &PortfolioView, settings: &DisplaySettings, include_dust: bool) {
    let totals = &view.totals;

    println!("\n{}", "📊 PORTFOLIO".bold());
    println!("{}", "═".repeat(72));
    println!(
        "💰 Total: {} | 24h: {} ({})",
        format_usd(totals.total_value).bold(),
        signed_usd(totals.total_change_usd()),
        format!("{:+.2}%", totals.total_change_pct())
    );
    println!(
        "   Solana: {} ({}) | EVM: {} ({})",
        format_usd(totals.total_sol_value),
        signed_usd(totals.total_change_sol_usd),
        format_usd(totals.total_evm_value),
        signed_usd(totals.total_change_evm_usd)
    );

    let allocation: Vec<String> = view
        .allocation_by_chain()
        .iter()
        .map(|slice| format!("{} {:.1}%", slice.label, slice.pct))
        .collect();
    if !allocation.is_empty() {
        println!("   Allocation: {}", allocation.join(" | "));
    }

    if !view.wallets.is_empty() {
        println!("{}", "─".repeat(72).bright_black());
        for wallet in &view.wallets {
            let day = wallet
                .day_change_usd
                .map(|change| format!(" | day {}", signed_usd(change)))
                .unwrap_or_default();
            println!(
                "👛 {:<7} {:<14} {:>14} | {} tokens | 24h {}{}",
                wallet.chain.to_string(),
                short_address(&wallet.wallet),
                format_usd(wallet.value_usd),
                wallet.holding_count,
                signed_usd(wallet.change_usd),
                day
            );
        }
    }

    let visible = view.visible_holdings(settings.dust_threshold_usd, include_dust);
    if visible.is_empty() {
        println!("{}", "💤 No holdings".bright_yellow());
        println!("{}", "═".repeat(72));
        return;
    }

    println!("{}", "─".repeat(72).bright_black());
    for holding in visible.iter().take(settings.top_holdings) {
        let share = if totals.total_value > 0.0 {
            holding.value / totals.total_value * 100.0
        } else {
            0.0
        };
        println!(
            "{:<10} {:<7} {:>14} {:>6.1}% | 24h {} | {} wallet(s)",
            truncate(if holding.symbol.is_empty() { &holding.address } else { &holding.symbol }, 10),
            holding.chain.to_string(),
            format_usd(holding.value),
            share,
            signed_usd(holding.change_usd),
            holding.sources.len()
        );
    }
    if visible.len() > settings.top_holdings {
        println!("   … {} more", visible.len() - settings.top_holdings);
    }

    let dust = view.dust_count(settings.dust_threshold_usd);
    if !include_dust && dust > 0 {
        println!(
            "{}",
            format!("   {} dust holdings under {} hidden", dust, format_usd(settings.dust_threshold_usd))
                .bright_black()
        );
    }
    println!("{}", "═".repeat(72));
}

pub fn print_status_messages(messages: &[StatusMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Error => println!("{} {}", "⚠️".red(), message.text.red()),
            MessageLevel::Info => println!("{} {}", "ℹ️".bright_blue(), message.text),
        }
    }
}
