// tests/command_template.rs

use std::error::Error;

use dfu_watch::config::{shell_quote, CommandTemplate};
use dfu_watch_test_utils::builders::DeviceBuilder;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn placeholders_are_substituted() -> TestResult {
    let template = CommandTemplate::parse(
        "dfu-util -d {vendor_id}:{product_id} -p {devpath} -S {serial} # port {port}",
    )?;
    let device = DeviceBuilder::new("3671376C3036")
        .ids(0x0483, 0xdf11)
        .devpath("2-1.4")
        .build();

    assert_eq!(
        template.render(&device)?,
        "dfu-util -d 0483:df11 -p 2-1.4 -S 3671376C3036 # port 4"
    );
    Ok(())
}

#[test]
fn doubled_braces_are_literal() -> TestResult {
    let template = CommandTemplate::parse("echo {{serial}} {serial} }}")?;
    let device = DeviceBuilder::new("S1").build();

    assert_eq!(template.render(&device)?, "echo {serial} S1 }");
    Ok(())
}

#[test]
fn template_without_placeholders_is_unchanged() -> TestResult {
    let template = CommandTemplate::parse("dfu-util -l")?;
    let device = DeviceBuilder::new("S1").build();

    assert_eq!(template.render(&device)?, "dfu-util -l");
    assert_eq!(template.to_string(), "dfu-util -l");
    Ok(())
}

#[test]
fn missing_serial_is_a_render_error() -> TestResult {
    let template = CommandTemplate::parse("flash -S {serial}")?;
    let device = DeviceBuilder::new("unused").without_serial().build();

    let err = template.render(&device).expect_err("no serial");
    assert!(err.contains("{serial}"), "{err}");
    Ok(())
}

#[test]
fn missing_port_is_a_render_error() -> TestResult {
    let template = CommandTemplate::parse("flash --port {port}")?;
    let device = DeviceBuilder::new("S1").devpath("usb1").build();

    assert!(template.render(&device).is_err());
    Ok(())
}

#[test]
fn malformed_templates_are_rejected() {
    assert!(CommandTemplate::parse("").is_err());
    assert!(CommandTemplate::parse("flash {serial").is_err());
    assert!(CommandTemplate::parse("flash {colour}").is_err());
    assert!(CommandTemplate::parse("flash }").is_err());
}

#[test]
fn hostile_serials_are_quoted() -> TestResult {
    let template = CommandTemplate::parse("flash -S {serial}")?;
    let device = DeviceBuilder::new("x; rm -rf ~").build();

    assert_eq!(template.render(&device)?, "flash -S 'x; rm -rf ~'");
    Ok(())
}

#[test]
fn shell_quoting() {
    assert_eq!(shell_quote("ABC-123_x.y"), "ABC-123_x.y");
    assert_eq!(shell_quote(""), "''");
    assert_eq!(shell_quote("a b"), "'a b'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
    assert_eq!(shell_quote("$(id)"), "'$(id)'");
}
