//! Session aggregation and report writers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tracker::Identity;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-identity averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityReport {
    /// Display id, `Student_N`
    pub id: String,
    pub avg_engagement: f64,
    pub avg_attention: f64,
    pub hand_raises: u32,
}

impl IdentityReport {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            avg_engagement: round2(identity.engagement.mean().unwrap_or(0.0)),
            avg_attention: round2(identity.attention.mean().unwrap_or(0.0)),
            hand_raises: identity.hand_raises(),
        }
    }
}

/// Class-wide aggregate metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub avg_engagement: f64,
    pub avg_attention: f64,
    pub total_hand_raises: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub duration_seconds: f64,
    pub total_identities: usize,
    pub frames_processed: u64,
    pub identities: Vec<IdentityReport>,
    pub summary: SessionSummary,
}

impl SessionReport {
    /// Report of a session that saw nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reduce identities into a report.
    ///
    /// `frame_count_hint` is the total reported by the source, used for the
    /// duration when known; `frames_processed` is used otherwise.
    pub fn from_identities(
        identities: &[Identity],
        frames_processed: u64,
        frame_count_hint: Option<u64>,
        fps: f64,
    ) -> Self {
        let frames = frame_count_hint.unwrap_or(frames_processed);
        let duration_seconds = if fps > 0.0 {
            round2(frames as f64 / fps)
        } else {
            0.0
        };

        let reports: Vec<IdentityReport> =
            identities.iter().map(IdentityReport::from_identity).collect();

        let summary = if reports.is_empty() {
            SessionSummary::default()
        } else {
            let n = reports.len() as f64;
            SessionSummary {
                avg_engagement: round2(reports.iter().map(|r| r.avg_engagement).sum::<f64>() / n),
                avg_attention: round2(reports.iter().map(|r| r.avg_attention).sum::<f64>() / n),
                total_hand_raises: reports.iter().map(|r| r.hand_raises).sum(),
            }
        };

        Self {
            duration_seconds,
            total_identities: reports.len(),
            frames_processed,
            identities: reports,
            summary,
        }
    }

    pub fn to_json_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_json_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Metric block, a blank line, then one row per identity.
    pub fn to_csv_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "Metric,Value")?;
        writeln!(writer, "Duration (seconds),{}", self.duration_seconds)?;
        writeln!(writer, "Total Students,{}", self.total_identities)?;
        writeln!(writer, "Frames Processed,{}", self.frames_processed)?;
        writeln!(writer)?;
        writeln!(writer, "Student ID,Engagement Score,Attention Score,Hand Raises")?;
        for r in &self.identities {
            writeln!(
                writer,
                "{},{},{},{}",
                r.id, r.avg_engagement, r.avg_attention, r.hand_raises
            )?;
        }
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_csv_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// One source's report inside a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Source name, usually the file stem or directory name.
    pub video: String,
    pub report: SessionReport,
}

/// Statistics across every report of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total_identities_across_videos: usize,
    /// Mean of the per-source class averages.
    pub avg_engagement: f64,
    pub avg_attention: f64,
    pub total_hand_raises: u32,
}

/// Combined report over independently analyzed sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_videos_processed: usize,
    pub videos: Vec<BatchEntry>,
    pub overall_statistics: BatchStatistics,
}

impl BatchReport {
    pub fn from_entries(videos: Vec<BatchEntry>) -> Self {
        let overall_statistics = if videos.is_empty() {
            BatchStatistics::default()
        } else {
            let n = videos.len() as f64;
            let summaries = || videos.iter().map(|v| &v.report.summary);
            BatchStatistics {
                total_identities_across_videos: videos
                    .iter()
                    .map(|v| v.report.total_identities)
                    .sum(),
                avg_engagement: round2(summaries().map(|s| s.avg_engagement).sum::<f64>() / n),
                avg_attention: round2(summaries().map(|s| s.avg_attention).sum::<f64>() / n),
                total_hand_raises: summaries().map(|s| s.total_hand_raises).sum(),
            }
        };

        Self {
            total_videos_processed: videos.len(),
            videos,
            overall_statistics,
        }
    }

    pub fn to_json_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_json_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
