//! End-to-end fusion over in-memory data sources.

use ndarray::{arr2, Array2};
use sessionfuse_core::error::Error;
use sessionfuse_core::source::{
    BehavioralDataSource, EllipseSeries, EventDetectionData, EyeTrackingData, ImagingMetadata,
    LoggedEvent, OpticalDataSource, ProjectionImage, ProjectionKind, RewardEvent, RoiRecord,
    SegmentationData, StimulusLog, TraceKind, TrialRecord,
};
use sessionfuse_core::{
    channel, PlaneGrouping, RawTrace, Result, SessionFusion, SyncChannelTimeline,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type ReadCounts = Rc<RefCell<HashMap<&'static str, usize>>>;

struct FakeOptical {
    sync: SyncChannelTimeline,
    dff: RawTrace,
    demixed: RawTrace,
    segmentation: SegmentationData,
    grouping: PlaneGrouping,
    events: EventDetectionData,
    eye: EyeTrackingData,
    reads: ReadCounts,
}

impl FakeOptical {
    fn count(&self, what: &'static str) {
        *self.reads.borrow_mut().entry(what).or_insert(0) += 1;
    }
}

impl OpticalDataSource for FakeOptical {
    fn ophys_experiment_id(&self) -> i64 {
        7777
    }

    fn sync_timeline(&self) -> Result<SyncChannelTimeline> {
        self.count("sync");
        Ok(self.sync.clone())
    }

    fn raw_trace(&self, kind: TraceKind) -> Result<RawTrace> {
        self.count("trace");
        Ok(match kind {
            TraceKind::Dff => self.dff.clone(),
            TraceKind::Demixed => self.demixed.clone(),
        })
    }

    fn event_detection(&self) -> Result<EventDetectionData> {
        self.count("events");
        Ok(self.events.clone())
    }

    fn segmentation(&self) -> Result<SegmentationData> {
        self.count("segmentation");
        Ok(self.segmentation.clone())
    }

    fn plane_grouping(&self) -> Result<PlaneGrouping> {
        Ok(self.grouping)
    }

    fn projection(&self, _kind: ProjectionKind) -> Result<ProjectionImage> {
        Ok(ProjectionImage {
            data: Array2::zeros((8, 8)),
            pixel_size_um: 0.78,
        })
    }

    fn imaging_metadata(&self) -> Result<ImagingMetadata> {
        Ok(ImagingMetadata {
            ophys_experiment_id: 7777,
            experiment_container_id: Some(88),
            targeted_structure: "VISp".to_string(),
            imaging_depth_um: 175,
            session_type: "OPHYS_1_images_A".to_string(),
            equipment_name: "CAM2P.3".to_string(),
            full_genotype: "Slc17a7-IRES2-Cre/wt".to_string(),
            reporter_line: "Ai93".to_string(),
            driver_line: vec!["Slc17a7-IRES2-Cre".to_string()],
            sex: "F".to_string(),
            age: "P120".to_string(),
        })
    }

    fn eye_tracking(&self) -> Result<EyeTrackingData> {
        Ok(self.eye.clone())
    }
}

struct FakeBehavior {
    log: StimulusLog,
}

impl BehavioralDataSource for FakeBehavior {
    fn stimulus_log(&self) -> Result<StimulusLog> {
        Ok(self.log.clone())
    }
}

fn roi(cell_roi_id: i64, specimen: i64, x: usize, y: usize) -> RoiRecord {
    RoiRecord {
        cell_roi_id,
        cell_specimen_id: Some(specimen),
        x,
        y,
        width: 2,
        height: 2,
        mask: vec![vec![true, true], vec![true, true]],
    }
}

fn ellipse_series(frames: usize) -> EllipseSeries {
    EllipseSeries {
        center_x: vec![3.0; frames],
        center_y: vec![4.0; frames],
        width: vec![1.0; frames],
        height: vec![1.5; frames],
        phi: vec![0.1; frames],
    }
}

/// Session fixture: 3 ROIs with canonical order [10, 20, 30], dff rows in
/// file order [30, 10, 20], 4 trace frames against 6 imaging pulses.
fn fixture(reads: ReadCounts) -> (FakeOptical, FakeBehavior) {
    let mut sync = SyncChannelTimeline::new();
    sync.insert(
        channel::OPHYS_FRAMES,
        (0..6).map(|i| f64::from(i) * 0.033).collect(),
    )
    .unwrap();
    let stim_no_delay: Vec<f64> = (0..4).map(|i| 10.0 + f64::from(i) * 0.02).collect();
    let stim_corrected: Vec<f64> = stim_no_delay.iter().map(|t| t + 0.0351).collect();
    sync.insert(channel::STIMULUS_FRAMES_NO_DELAY, stim_no_delay)
        .unwrap();
    sync.insert(channel::STIMULUS_FRAMES, stim_corrected).unwrap();
    sync.insert(channel::LICK_SENSOR, vec![10.01, 10.03]).unwrap();
    sync.insert(
        channel::EYE_CAMERA_FRAMES,
        (0..5).map(|i| f64::from(i) * 0.05).collect(),
    )
    .unwrap();

    // Rows A, B, C carry the constant values 1, 2, 3.
    let dff = RawTrace::new(
        arr2(&[
            [1.0, 1.0, 1.0, 1.0],
            [2.0, 2.0, 2.0, 2.0],
            [3.0, 3.0, 3.0, 3.0],
        ]),
        vec![30, 10, 20],
    )
    .unwrap();
    let demixed = RawTrace::new(
        arr2(&[
            [10.0, 10.0, 10.0, 10.0],
            [30.0, 30.0, 30.0, 30.0],
            [20.0, 20.0, 20.0, 20.0],
        ]),
        vec![10, 30, 20],
    )
    .unwrap();

    let events = EventDetectionData {
        events: arr2(&[
            [0.0, 0.2, 0.0, 0.0],
            [0.0, 0.0, 0.3, 0.0],
            [0.1, 0.0, 0.0, 0.0],
        ]),
        lambdas: vec![0.2, 0.3, 0.1],
        noise_stds: vec![0.02, 0.03, 0.01],
        roi_ids: vec![20, 30, 10],
    };

    let optical = FakeOptical {
        sync,
        dff,
        demixed,
        segmentation: SegmentationData {
            fov_height: 8,
            fov_width: 8,
            rois: vec![roi(30, 102, 4, 4), roi(10, 100, 0, 0), roi(20, 101, 2, 2)],
        },
        grouping: PlaneGrouping::default(),
        events,
        eye: EyeTrackingData {
            corneal_reflection: ellipse_series(5),
            eye: ellipse_series(5),
            pupil: ellipse_series(5),
        },
        reads,
    };

    let behavior = FakeBehavior {
        log: StimulusLog {
            session_uuid: "3d3f44cf-b1c8-4b39-abf5-be2b4f2c50b4".to_string(),
            intervals_ms: vec![16.0, 16.0, 16.0],
            lick_frames: vec![1, 2],
            rewards: vec![RewardEvent {
                frame: 2,
                volume: 0.007,
                auto_rewarded: false,
            }],
            trials: vec![TrialRecord {
                index: 0,
                start_frame: 0,
                stop_frame: 3,
                change_frame: Some(1),
            }],
            // Wall clock leads the frame clock by exactly 2 s.
            logged_events: vec![
                LoggedEvent {
                    frame: 0,
                    wall_time: 2.0,
                },
                LoggedEvent {
                    frame: 2,
                    wall_time: 2.032,
                },
            ],
        },
    };

    (optical, behavior)
}

fn fusion() -> (SessionFusion<FakeOptical, FakeBehavior>, ReadCounts) {
    let reads: ReadCounts = Rc::default();
    let (optical, behavior) = fixture(Rc::clone(&reads));
    (SessionFusion::new(optical, behavior), reads)
}

#[test]
fn test_dff_rows_follow_canonical_order_with_specimen_join() {
    let (mut session, _) = fusion();
    let traces = session.dff_traces().unwrap();

    assert_eq!(traces.roi_ids, vec![10, 20, 30]);
    assert_eq!(
        traces.specimen_ids,
        vec![Some(100), Some(101), Some(102)]
    );
    // File rows [A, B, C] under ids [30, 10, 20] land as [B, C, A].
    assert_eq!(traces.data.row(0).to_vec(), vec![2.0; 4]);
    assert_eq!(traces.data.row(1).to_vec(), vec![3.0; 4]);
    assert_eq!(traces.data.row(2).to_vec(), vec![1.0; 4]);
}

#[test]
fn test_every_modality_shares_row_identity() {
    let (mut session, _) = fusion();
    let dff = session.dff_traces().unwrap();
    let demixed = session.demixed_traces().unwrap();
    let events = session.events().unwrap();

    assert_eq!(dff.roi_ids, demixed.roi_ids);
    assert_eq!(dff.roi_ids, events.roi_ids);
    // Demixed rows carry their own ROI id as value, proving the permutation.
    for (row, &roi_id) in demixed.roi_ids.iter().enumerate() {
        assert_eq!(demixed.data[[row, 0]], roi_id as f64);
    }
    assert_eq!(events.lambdas, vec![0.1, 0.2, 0.3]);
    assert_eq!(events.noise_stds, vec![0.01, 0.02, 0.03]);
}

#[test]
fn test_ophys_timestamps_truncate_to_trace_frames() {
    let (mut session, _) = fusion();
    let timestamps = session.ophys_timestamps().unwrap();
    // 6 pulses, 4 trace frames: prefix truncation.
    assert_eq!(timestamps.len(), 4);
    assert_eq!(timestamps[0], 0.0);
    assert_eq!(timestamps[3], 3.0 * 0.033);
}

#[test]
fn test_licks_and_rewards_land_on_sync_clock() {
    let (mut session, _) = fusion();
    let licks = session.licks().unwrap();
    // Local frame clock is offset by 2 s; the rebase maps frame n to the
    // sync-domain stimulus time 10.0 + n * 0.02 regardless.
    assert_eq!(licks.len(), 2);
    assert!((licks[0] - 10.02).abs() < 1e-9);
    assert!((licks[1] - 10.04).abs() < 1e-9);

    let rewards = session.rewards().unwrap();
    assert_eq!(rewards.len(), 1);
    assert!((rewards[0].time - 10.04).abs() < 1e-9);
    assert!(!rewards[0].auto_rewarded);
}

#[test]
fn test_trials_attribute_events_in_window() {
    let (mut session, _) = fusion();
    let trials = session.trials().unwrap();
    assert_eq!(trials.len(), 1);
    let trial = &trials[0];
    assert!((trial.start_time - 10.0).abs() < 1e-9);
    assert!((trial.stop_time - 10.06).abs() < 1e-9);
    assert_eq!(trial.lick_times.len(), 2);
    assert_eq!(trial.reward_times.len(), 1);
    assert!((trial.change_time.unwrap() - 10.02).abs() < 1e-9);
}

#[test]
fn test_queries_are_memoized() {
    let (mut session, reads) = fusion();
    session.dff_traces().unwrap();
    session.dff_traces().unwrap();
    session.ophys_timestamps().unwrap();

    let reads = reads.borrow();
    // Sync recording and dff trace are each read exactly once even though
    // three queries depended on them.
    assert_eq!(reads["sync"], 1);
    assert_eq!(reads["trace"], 1);
}

#[test]
fn test_metadata_combines_sources() {
    let (mut session, _) = fusion();
    let metadata = session.metadata().unwrap();
    assert_eq!(metadata.ophys_experiment_id, 7777);
    assert_eq!(metadata.targeted_structure, "VISp");
    assert_eq!(
        metadata.behavior_session_uuid,
        "3d3f44cf-b1c8-4b39-abf5-be2b4f2c50b4"
    );
    assert_eq!(metadata.field_of_view_height, 8);
    assert_eq!(metadata.indicator, "GCaMP6f");
    // 0.02 s stimulus pulse spacing is 50 Hz.
    assert_eq!(metadata.stimulus_frame_rate_hz, Some(50.0));
}

#[test]
fn test_roi_mask_query_is_local() {
    let (mut session, _) = fusion();
    let err = session.roi_masks(Some(&[999])).unwrap_err();
    match err {
        Error::UnknownRoi(roi_id) => assert_eq!(roi_id, 999),
        other => panic!("unexpected error: {other}"),
    }
    // The failed query does not poison the session's other artifacts.
    let volume = session.roi_masks(None).unwrap();
    assert_eq!(volume.roi_ids, vec![10, 20, 30]);
    assert_eq!(volume.masks.dim(), (3, 8, 8));
    assert!(volume.masks[[0, 0, 0]]);
    assert!(volume.masks[[2, 4, 4]]);
}

#[test]
fn test_identity_mismatch_reports_offenders() {
    let reads: ReadCounts = Rc::default();
    let (mut optical, behavior) = fixture(Rc::clone(&reads));
    optical.dff = RawTrace::new(
        arr2(&[
            [1.0, 1.0, 1.0, 1.0],
            [2.0, 2.0, 2.0, 2.0],
            [3.0, 3.0, 3.0, 3.0],
        ]),
        vec![30, 10, 40],
    )
    .unwrap();
    let mut session = SessionFusion::new(optical, behavior);

    let err = session.dff_traces().unwrap_err();
    match err {
        Error::IdentityMismatch {
            missing_from_table,
            missing_from_trace,
            ..
        } => {
            assert_eq!(missing_from_table, vec![40]);
            assert_eq!(missing_from_trace, vec![20]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_eye_tracking_joins_strobe_times() {
    let (mut session, _) = fusion();
    let eye = session.eye_tracking().unwrap();
    assert_eq!(eye.frame_times.len(), 5);
    assert_eq!(eye.data.num_frames(), 5);
}

#[test]
fn test_eye_tracking_row_mismatch_is_fatal() {
    let reads: ReadCounts = Rc::default();
    let (mut optical, behavior) = fixture(Rc::clone(&reads));
    optical.eye = EyeTrackingData {
        corneal_reflection: ellipse_series(4),
        eye: ellipse_series(4),
        pupil: ellipse_series(4),
    };
    let mut session = SessionFusion::new(optical, behavior);

    assert!(matches!(
        session.eye_tracking().unwrap_err(),
        Error::AlignmentMismatch { .. }
    ));
}

#[test]
fn test_mesoscope_session_requires_exact_resample() {
    let reads: ReadCounts = Rc::default();
    let (mut optical, behavior) = fixture(Rc::clone(&reads));
    // 6 pulses over 2 plane groups: 3 timestamps for plane group 1, but
    // the trace still holds 4 frames.
    optical.grouping = PlaneGrouping {
        plane_group: Some(1),
        group_count: 2,
    };
    let mut session = SessionFusion::new(optical, behavior);

    assert!(matches!(
        session.ophys_timestamps().unwrap_err(),
        Error::AlignmentMismatch { .. }
    ));
}

#[test]
fn test_failed_artifact_is_not_cached() {
    let reads: ReadCounts = Rc::default();
    let (mut optical, behavior) = fixture(Rc::clone(&reads));
    optical.grouping = PlaneGrouping {
        plane_group: Some(1),
        group_count: 2,
    };
    let mut session = SessionFusion::new(optical, behavior);

    assert!(session.ophys_timestamps().is_err());
    // Nothing partial was stored for the failed artifact; its successful
    // inputs stayed cached and the derivation re-runs on retry.
    assert!(session.ophys_timestamps().is_err());
    let reads = reads.borrow();
    assert_eq!(reads["sync"], 1);
}
