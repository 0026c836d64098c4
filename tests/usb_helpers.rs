// tests/usb_helpers.rs

use dfu_watch::types::IndicatorColor;
use dfu_watch::usb::hub::{indicator_index, supports_port_indicators};
use dfu_watch::usb::{devpath_from_ports, port_from_devpath, DeviceFilter};
use dfu_watch_test_utils::builders::DeviceBuilder;

#[test]
fn port_is_parsed_from_devpath_suffix() {
    assert_eq!(port_from_devpath("1-1.4"), Some(4));
    assert_eq!(port_from_devpath("1-3"), Some(3));
    assert_eq!(port_from_devpath("2-1.2.12"), Some(12));
    assert_eq!(
        port_from_devpath("/sys/devices/pci0000:00/0000:00:14.0/usb1/1-1/1-1.7"),
        Some(7)
    );

    assert_eq!(port_from_devpath("usb1"), None);
    assert_eq!(port_from_devpath("1-1."), None);
    assert_eq!(port_from_devpath(""), None);
    assert_eq!(port_from_devpath("1-1.999"), None);
}

#[test]
fn devpath_is_built_from_port_chain() {
    assert_eq!(devpath_from_ports("1", &[1, 4]), "1-1.4");
    assert_eq!(devpath_from_ports("3", &[2]), "3-2");
    assert_eq!(devpath_from_ports("1", &[]), "usb1");
    assert_eq!(port_from_devpath(&devpath_from_ports("2", &[1, 2, 3])), Some(3));
}

#[test]
fn label_prefers_serial_over_devpath() {
    let with_serial = DeviceBuilder::new("SER1").devpath("1-1.2").build();
    assert_eq!(with_serial.label(), "SER1");

    let without = DeviceBuilder::new("x").without_serial().devpath("1-1.2").build();
    assert_eq!(without.label(), "1-1.2");

    let blank = DeviceBuilder::new("  ").devpath("1-1.5").build();
    assert_eq!(blank.label(), "1-1.5");
}

#[test]
fn filter_matches_ids_and_dfu_capability() {
    let dfu = DeviceBuilder::new("a").ids(0x0483, 0xdf11).build();
    let other = DeviceBuilder::new("b").ids(0x0483, 0x5740).build();
    let not_dfu = DeviceBuilder::new("c").dfu_capable(false).build();

    let any = DeviceFilter::default();
    assert!(any.matches(&dfu) && any.matches(&other) && any.matches(&not_dfu));

    let by_ids = DeviceFilter {
        vendor_id: Some(0x0483),
        product_id: Some(0xdf11),
        dfu_only: false,
    };
    assert!(by_ids.matches(&dfu));
    assert!(!by_ids.matches(&other));

    let dfu_only = DeviceFilter {
        dfu_only: true,
        ..DeviceFilter::default()
    };
    assert!(dfu_only.matches(&dfu));
    assert!(!dfu_only.matches(&not_dfu));
}

#[test]
fn hub_descriptor_indicator_bit() {
    // bLength, bDescriptorType, bNbrPorts, wHubCharacteristics (lo, hi), ...
    let with = [0x09, 0x29, 0x04, 0x89, 0x00, 0x32, 0x64, 0x00, 0xff];
    let without = [0x09, 0x29, 0x04, 0x09, 0x00, 0x32, 0x64, 0x00, 0xff];

    assert!(supports_port_indicators(&with));
    assert!(!supports_port_indicators(&without));
    assert!(!supports_port_indicators(&[0x09, 0x29, 0x04]));
}

#[test]
fn indicator_index_packs_selector_and_port() {
    assert_eq!(indicator_index(3, IndicatorColor::Automatic), 0x0003);
    assert_eq!(indicator_index(3, IndicatorColor::Amber), 0x0103);
    assert_eq!(indicator_index(7, IndicatorColor::Green), 0x0207);
    assert_eq!(indicator_index(1, IndicatorColor::Off), 0x0301);
}
