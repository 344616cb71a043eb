//! Property tests for queue ordering, host integer validation, gain clamping
//! and input binding.

use camera_session::modes::white_balance::clamp_gains;
use camera_session::platform::{DevicePosition, MockPlatform, WhiteBalanceGains};
use camera_session::{
    AutoFocusMode, CameraError, CameraManager, CameraPosition, ExposureMode, FlashMode,
    ManagerConfig, SerialQueue, WhiteBalancePreset,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn accepted_range(
    result: Result<i64, CameraError>,
    value: i64,
    range: std::ops::RangeInclusive<i64>,
) {
    match result {
        Ok(round_trip) => {
            assert!(range.contains(&value));
            assert_eq!(round_trip, value);
        }
        Err(error) => {
            assert!(!range.contains(&value));
            assert!(matches!(error, CameraError::InvalidArgument(_)));
        }
    }
}

proptest! {
    #[test]
    fn queue_runs_work_in_submission_order(values in prop::collection::vec(any::<u32>(), 0..200)) {
        let queue = SerialQueue::spawn("prop.fifo", |_| Vec::new()).unwrap();
        for value in values.clone() {
            queue.submit(move |seen: &mut Vec<u32>| seen.push(value)).unwrap();
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        queue
            .submit(move |seen: &mut Vec<u32>| {
                let _ = tx.send(seen.clone());
            })
            .unwrap();

        let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        prop_assert_eq!(seen, values);
    }

    #[test]
    fn host_integers_are_validated(value in -10i64..20) {
        accepted_range(
            CameraPosition::from_host(value).map(CameraPosition::host_value),
            value,
            0..=1,
        );
        accepted_range(FlashMode::from_host(value).map(FlashMode::host_value), value, 0..=3);
        accepted_range(
            AutoFocusMode::from_host(value).map(AutoFocusMode::host_value),
            value,
            0..=1,
        );
        accepted_range(
            ExposureMode::from_host(value).map(ExposureMode::host_value),
            value,
            0..=2,
        );
        accepted_range(
            WhiteBalancePreset::from_host(value).map(WhiteBalancePreset::host_value),
            value,
            0..=6,
        );
    }

    #[test]
    fn clamped_gains_stay_in_device_range(
        red in 0.01f32..50.0,
        green in 0.01f32..50.0,
        blue in 0.01f32..50.0,
        max_gain in 1.0f32..8.0,
    ) {
        let clamped = clamp_gains(WhiteBalanceGains::new(red, green, blue), max_gain);
        for channel in [clamped.red, clamped.green, clamped.blue] {
            prop_assert!((1.0..=max_gain).contains(&channel), "{channel} outside [1, {max_gain}]");
        }
    }

    #[test]
    fn clamped_gains_keep_ratios_when_they_fit(
        red in 0.1f32..10.0,
        green in 0.1f32..10.0,
        blue in 0.1f32..10.0,
        max_gain in 1.0f32..8.0,
    ) {
        let gains = WhiteBalanceGains::new(red, green, blue);
        prop_assume!(gains.max_channel() / gains.min_channel() <= max_gain * 0.999);

        let clamped = clamp_gains(gains, max_gain);
        let tolerance = 1e-3;
        let (red_ratio, blue_ratio) = (red / green, blue / green);
        prop_assert!((clamped.red / clamped.green - red_ratio).abs() <= tolerance * red_ratio);
        prop_assert!((clamped.blue / clamped.green - blue_ratio).abs() <= tolerance * blue_ratio);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn at_most_one_input_is_ever_bound(
        steps in prop::collection::vec((any::<bool>(), any::<bool>()), 1..12),
    ) {
        let platform = MockPlatform::new();
        let manager =
            CameraManager::new(Arc::new(platform.clone()), ManagerConfig::in_memory()).unwrap();

        for (front, reject) in steps {
            let (position, device) = if front {
                (CameraPosition::Front, DevicePosition::Front)
            } else {
                (CameraPosition::Back, DevicePosition::Back)
            };
            let before = manager.snapshot().bound_position;

            platform.accept_all_inputs();
            if reject {
                platform.reject_inputs_for(device);
            }
            let result = manager.set_camera_position(position).wait();

            let bound = platform.bound_positions();
            prop_assert!(bound.len() <= 1);
            let after = manager.snapshot().bound_position;
            match result {
                Ok(()) => prop_assert_eq!(after, Some(position)),
                Err(CameraError::InputRejected(_)) => {
                    prop_assert!(reject);
                    prop_assert_eq!(after, before);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
            prop_assert_eq!(
                bound.first().copied(),
                after.map(CameraPosition::device_position)
            );
        }
    }
}
