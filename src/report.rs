//! Report rendering.
//!
//! Turns a [`ScanResult`] into its output forms: a Markdown file, a JSON
//! file, and a compact webhook message. Rendering is pure; only
//! [`save_to_file`](ScanReport::save_to_file) touches the filesystem.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::info;

use crate::scan::ScanResult;

/// Discord rejects message bodies above this length.
pub const WEBHOOK_MAX_CHARS: usize = 2000;

// ============================================================================
// Report Format
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
    Webhook,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Webhook => "txt",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "webhook" | "discord" => Ok(Self::Webhook),
            other => anyhow::bail!("Unknown report format: {}", other),
        }
    }
}

// ============================================================================
// Scan Report
// ============================================================================

/// Report renderer over one scan result.
pub struct ScanReport<'a> {
    result: &'a ScanResult,
}

impl<'a> ScanReport<'a> {
    pub fn new(result: &'a ScanResult) -> Self {
        Self { result }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Markdown => Ok(self.to_markdown()),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Webhook => Ok(self.to_webhook_message()),
        }
    }

    /// Full Markdown report: candidate table plus the rejection funnel.
    pub fn to_markdown(&self) -> String {
        let r = self.result;
        let mut out = String::new();

        out.push_str(&format!(
            "# 強勢突破掃描報告 {}\n\n",
            r.started_at.format("%Y-%m-%d %H:%M UTC")
        ));
        out.push_str(&format!("條件: {}\n\n", r.config_summary));

        if r.universe_size == 0 {
            out.push_str("⚠️ 無法取得上市櫃清單，本次掃描範圍為空。\n");
            return out;
        }

        if r.candidates.is_empty() {
            out.push_str("今日無符合條件的標的。\n\n");
        } else {
            out.push_str(&format!("## 入選標的 ({} 檔)\n\n", r.candidates.len()));
            out.push_str(
                "| # | 代號 | 名稱 | 收盤 | 漲幅% | 乖離% | VCP | 5日均量(張) | 分數 | 停損 | 停利 |\n",
            );
            out.push_str(
                "|---|------|------|------|-------|-------|-----|-------------|------|------|------|\n",
            );
            for (i, c) in r.candidates.iter().enumerate() {
                out.push_str(&format!(
                    "| {} | {} | {} | {:.2} | {:+.2} | {:+.2} | {:.2} | {:.0} | {:.2} | {:.2} | {:.2} |\n",
                    i + 1,
                    c.code,
                    c.name,
                    c.price,
                    c.change_pct,
                    c.bias_pct,
                    c.vcp_ratio,
                    c.vol_ma5 / 1000.0,
                    c.score,
                    c.stop_loss,
                    c.take_profit
                ));
            }
            out.push('\n');
        }

        let s = &r.stats;
        out.push_str("## 篩選統計\n\n");
        out.push_str(&format!("- 掃描檔數: {}\n", s.scanned));
        out.push_str(&format!("- 資料不足/失敗: {}\n", s.fail));
        out.push_str(&format!("- 漲幅淘汰: {}\n", s.r_momentum));
        out.push_str(&format!("- 紅K淘汰: {}\n", s.r_candle));
        out.push_str(&format!("- 均線淘汰: {}\n", s.r_ma));
        out.push_str(&format!("- 乖離淘汰: {}\n", s.r_bias));
        out.push_str(&format!("- 量能淘汰: {}\n", s.r_volume));
        out.push_str(&format!("- VCP淘汰: {}\n", s.r_vcp));
        out.push_str(&format!("- KD淘汰: {}\n", s.r_kd));
        out.push_str(&format!("- 通過: {}\n", s.passed));
        out.push_str(&format!("\n耗時 {:.1} 秒\n", r.duration_secs));

        out
    }

    /// Machine-readable report: the full result serialized as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self.result).context("Failed to serialize scan result")
    }

    /// Compact message for the webhook channel, truncated to the Discord
    /// body limit.
    pub fn to_webhook_message(&self) -> String {
        let r = self.result;
        let mut out = String::new();

        out.push_str(&format!(
            "📈 **強勢突破掃描 {}**\n",
            r.started_at.format("%Y-%m-%d")
        ));

        if r.universe_size == 0 {
            out.push_str("⚠️ 無法取得上市櫃清單，本次掃描範圍為空。");
            return out;
        }

        if r.candidates.is_empty() {
            out.push_str(&format!(
                "今日無符合條件的標的 (掃描 {} 檔)。",
                r.stats.scanned
            ));
            return out;
        }

        for (i, c) in r.candidates.iter().enumerate() {
            let line = format!(
                "{}. **{}** {} 收{:.2} ({:+.2}%) 分數{:.1} 停損{:.2} 停利{:.2}\n",
                i + 1,
                c.code,
                c.name,
                c.price,
                c.change_pct,
                c.score,
                c.stop_loss,
                c.take_profit
            );
            if out.chars().count() + line.chars().count() > WEBHOOK_MAX_CHARS {
                break;
            }
            out.push_str(&line);
        }
        out.push_str(&format!(
            "共 {} 檔通過 / 掃描 {} 檔",
            r.stats.passed, r.stats.scanned
        ));

        truncate_chars(&out, WEBHOOK_MAX_CHARS)
    }

    /// Write one rendered report under `report_dir`, creating the directory
    /// as needed. Returns the written path.
    pub fn save_to_file(&self, report_dir: &str, format: ReportFormat) -> Result<PathBuf> {
        let dir = expand_report_dir(report_dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let path = dir.join(format!("{}.{}", self.result.id, format.extension()));
        let content = self.render(format)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write report {}", path.display()))?;

        info!(path = %path.display(), "Report saved");
        Ok(path)
    }
}

/// Expand a leading `~/` against the user's home directory.
fn expand_report_dir(dir: &str) -> PathBuf {
    if let Some(rest) = dir.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(dir).to_path_buf()
}

/// Truncate on a character boundary, never mid-codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

// ============================================================================
// Tests
// ============================================================================
