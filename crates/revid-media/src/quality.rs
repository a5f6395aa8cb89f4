//! Quality-analysis (libvmaf) command builder.

use std::path::Path;

/// VMAF model file for the requested mode. The NEG ("no enhancement
/// gain") variant scores pure compression impact.
pub fn vmaf_model_filename(neg_mode: bool) -> &'static str {
    if neg_mode {
        "vmaf_v0.6.1neg.json"
    } else {
        "vmaf_v0.6.1.json"
    }
}

/// URL the model file can be fetched from when not already on disk.
pub fn vmaf_model_url(neg_mode: bool) -> String {
    format!(
        "https://raw.githubusercontent.com/Netflix/vmaf/master/model/{}",
        vmaf_model_filename(neg_mode)
    )
}

/// Threads handed to libvmaf: 90% of the machine, floored, at least one.
pub fn default_thread_count() -> usize {
    ((num_cpus::get() as f64 * 0.9).floor() as usize).max(1)
}

/// One quality-analysis invocation.
#[derive(Debug, Clone)]
pub struct QualityJob<'a> {
    pub reference: &'a Path,
    pub compressed: &'a Path,
    /// Model file in the working directory.
    pub model_path: &'a Path,
    pub psnr: bool,
    pub ms_ssim: bool,
    pub subsample_rate: i64,
    pub threads: usize,
    /// Deinterlace the reference input only; set when the reference is
    /// interlaced but the compressed output is progressive.
    pub deinterlace_reference: bool,
    /// Report file the filter writes, relative to the working directory.
    pub report_name: &'a str,
}

/// Build the full ffmpeg argv for a quality analysis run.
///
/// The compressed file is input 0 and the reference input 1, matching
/// libvmaf's distorted/reference ordering.
pub fn quality_command(job: &QualityJob<'_>) -> Vec<String> {
    let feature_argument = match (job.psnr, job.ms_ssim) {
        (true, false) => "feature=name=psnr:",
        (false, true) => "feature=name=float_ms_ssim:",
        (true, true) => "feature=name=psnr|name=float_ms_ssim:",
        (false, false) => "",
    };

    let interlace_filter = if job.deinterlace_reference {
        "[1:v]bwdif=0:-1:0[ref];[0:v][ref]"
    } else {
        ""
    };

    let model_stem = job
        .model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let model_name = job
        .model_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let filter = format!(
        "{}libvmaf={}n_subsample={}:model=version={}|path={}:log_path={}:n_threads={}:log_fmt=json",
        interlace_filter,
        feature_argument,
        job.subsample_rate,
        model_stem,
        model_name,
        job.report_name,
        job.threads,
    );

    let mut args: Vec<String> = crate::encode::BASE_FFMPEG_ARGS
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    args.extend([
        "-loglevel".into(),
        "warning".into(),
        "-i".into(),
        job.compressed.to_string_lossy().into_owned(),
        "-i".into(),
        job.reference.to_string_lossy().into_owned(),
        "-lavfi".into(),
        filter,
        "-f".into(),
        "null".into(),
        "-".into(),
    ]);
    args
}
