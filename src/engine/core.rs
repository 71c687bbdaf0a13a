mod command;
mod estimate;
mod progress;
mod scan;
mod types;

pub use command::{build_ffmpeg_cmd, encoder_args, format_cmd, selected_encoder, vp9_crf};
pub use estimate::{
    estimate_batch_mb, estimate_from_bitrate, estimate_from_input_size, estimate_mb,
    quality_factor,
};
pub use progress::{PROGRESS_THROTTLE, ProgressMonitor, parse_out_time};
pub use scan::{is_prior_output, is_video_file, scan, scan_streaming};
pub use types::{
    BatchPlan, BatchReport, COMPRESSED_MARKER, Codec, HwAccel, Job, JobStatus, ProgressSnapshot,
    derive_output_path, ensure_extension,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("test.mp4")));
        assert!(is_video_file(Path::new("test.MP4")));
        assert!(is_video_file(Path::new("test.mkv")));
        assert!(is_video_file(Path::new("test.webm")));
        assert!(is_video_file(Path::new("test.mov")));

        assert!(!is_video_file(Path::new("test.txt")));
        assert!(!is_video_file(Path::new("test.jpg")));
        assert!(!is_video_file(Path::new("test")));
    }

    #[test]
    fn test_prior_outputs_are_excluded() {
        assert!(is_prior_output(Path::new("movie_compressed.mp4")));
        assert!(is_prior_output(Path::new("/tmp/a_compressed.webm")));
        assert!(!is_prior_output(Path::new("movie.mp4")));
        assert!(!is_prior_output(Path::new("compressor_manual.mkv")));
    }

    #[test]
    fn test_codec_container_extensions() {
        assert_eq!(Codec::H264.container_ext(), "mp4");
        assert_eq!(Codec::H265.container_ext(), "mp4");
        assert_eq!(Codec::Vp9.container_ext(), "webm");
        assert_eq!(Codec::Av1.container_ext(), "mkv");
    }

    #[test]
    fn test_codec_parsing() {
        assert_eq!("h264".parse::<Codec>().unwrap(), Codec::H264);
        assert_eq!("HEVC".parse::<Codec>().unwrap(), Codec::H265);
        assert!("mpeg2".parse::<Codec>().is_err());
    }

    #[test]
    fn test_derive_output_path() {
        let out = derive_output_path(Path::new("/videos/clip.mov"), Codec::Vp9, None);
        assert_eq!(out, PathBuf::from("/videos/clip_compressed.webm"));

        let out = derive_output_path(
            Path::new("/videos/clip.mov"),
            Codec::H265,
            Some(Path::new("/out")),
        );
        assert_eq!(out, PathBuf::from("/out/clip_compressed.mp4"));
    }

    #[test]
    fn test_job_appends_missing_extension() {
        let job = Job::new(
            PathBuf::from("in.mp4"),
            Some(PathBuf::from("out")),
            Codec::Av1,
            23,
            HwAccel::None,
        );
        assert_eq!(job.output_path, PathBuf::from("out.mkv"));

        // A caller-supplied extension is kept as-is.
        let job = Job::new(
            PathBuf::from("in.mp4"),
            Some(PathBuf::from("out.mp4")),
            Codec::Av1,
            23,
            HwAccel::None,
        );
        assert_eq!(job.output_path, PathBuf::from("out.mp4"));
    }

    #[test]
    fn test_vp9_crf_rescale() {
        assert_eq!(vp9_crf(23), 28);
        assert_eq!(vp9_crf(0), 0);
        assert_eq!(vp9_crf(51), 63);
    }

    #[test]
    fn test_parse_out_time() {
        assert_eq!(parse_out_time("out_time_ms=5000000"), Some(5_000_000));
        assert_eq!(parse_out_time("out_time_ms= 1200 "), Some(1200));
        assert_eq!(parse_out_time("out_time=00:00:05.000000"), None);
        assert_eq!(parse_out_time("frame=42"), None);
        assert_eq!(parse_out_time("garbage"), None);
        assert_eq!(parse_out_time("out_time_ms=not-a-number"), None);
    }

    #[test]
    fn test_batch_plan_preserves_order() {
        let files = vec![
            PathBuf::from("/v/b.mp4"),
            PathBuf::from("/v/a.mp4"),
            PathBuf::from("/v/c.mp4"),
        ];
        let plan = BatchPlan::new(files.clone(), Codec::H264, 23, HwAccel::None, None);
        assert_eq!(plan.len(), 3);
        for (job, input) in plan.jobs.iter().zip(&files) {
            assert_eq!(&job.input_path, input);
            assert_eq!(job.status, JobStatus::Pending);
        }
        assert_eq!(plan.jobs[0].output_path, PathBuf::from("/v/b_compressed.mp4"));
    }

    #[test]
    fn test_quality_factor_reference_point() {
        assert!((quality_factor(23) - 1.0).abs() < 1e-12);
        // Six steps better doubles, six steps worse halves.
        assert!((quality_factor(17) - 2.0).abs() < 1e-12);
        assert!((quality_factor(29) - 0.5).abs() < 1e-12);
    }
}
