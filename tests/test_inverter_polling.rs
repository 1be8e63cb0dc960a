mod common;
use common::*;
use axpert_bridge::prelude::*;

#[tokio::test]
async fn blocking_read_returns_first_record() {
    common_setup();

    let device = MockDevice::replying(Factory::sample_response());
    let inverter = PollingInverter::connect(device.clone(), Factory::polling_timings(), false)
        .await
        .unwrap();

    let reading = inverter.get_stats(true).await.unwrap().unwrap();
    assert_eq!(reading.status().unwrap().record.grid_volt, Some(230.1));

    // once cached, non-blocking reads are served straight away
    assert!(inverter.get_stats(false).await.unwrap().is_some());

    inverter.close().await.unwrap();
    assert_eq!(device.state().releases, 1);
}

#[tokio::test]
async fn non_blocking_read_without_data() {
    let device = MockDevice::default();
    let inverter = PollingInverter::connect(device, Factory::polling_timings(), false)
        .await
        .unwrap();

    assert_eq!(inverter.get_stats(false).await.unwrap(), None);
    assert!(!inverter.is_stopped());

    inverter.close().await.unwrap();
}

#[tokio::test]
async fn blocking_read_gives_up_and_stops_poller() {
    common_setup();

    let device = MockDevice::default();
    let inverter = PollingInverter::connect(device.clone(), Factory::polling_timings(), false)
        .await
        .unwrap();

    let err = inverter.get_stats(true).await.unwrap_err();
    assert!(matches!(err, DeviceError::Connection(_)));
    assert!(inverter.is_stopped());

    inverter.close().await.unwrap();
    assert_eq!(device.state().releases, 1);
}

#[tokio::test]
async fn failures_are_discarded_until_a_good_frame() {
    let device = MockDevice::replying(Factory::sample_response());
    {
        let mut state = device.state();
        state.responses.push_back(b"(short\r".to_vec());
        state.responses.push_back(Vec::new());
        state.responses.push_back(b"(230.1 bogus 00000\r".to_vec());
    }

    let inverter = PollingInverter::connect(device.clone(), Factory::polling_timings(), false)
        .await
        .unwrap();

    let reading = inverter.get_stats(true).await.unwrap().unwrap();
    assert_eq!(reading.status().unwrap().record.ac_watt, Some(410));
    assert!(device.state().writes >= 4);

    inverter.close().await.unwrap();
}

#[tokio::test]
async fn io_failures_never_reach_the_cache() {
    let device = MockDevice::failing_io();
    let inverter = PollingInverter::connect(device.clone(), Factory::polling_timings(), false)
        .await
        .unwrap();

    assert!(inverter.get_stats(true).await.is_err());
    assert!(inverter.cache().is_empty());

    inverter.close().await.unwrap();
}

#[tokio::test]
async fn raw_readings_render_as_text() {
    let device = MockDevice::replying(Factory::sample_response());
    let inverter = PollingInverter::connect(device, Factory::polling_timings(), true)
        .await
        .unwrap();

    let reading = inverter.get_stats(true).await.unwrap().unwrap();
    let json = reading.render(OutputFormat::Json).unwrap();
    assert!(json.starts_with("\"(230.1 50.0"));

    inverter.close().await.unwrap();
}
