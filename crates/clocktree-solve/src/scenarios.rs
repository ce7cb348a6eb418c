//! End-to-end solver runs on the builtin chips.

use clocktree_chips::{stm32h533, stm32h7s3};
use clocktree_core::{Frequency, Literal, SolveError, Subsystem};

use crate::stages::i2c::{best_timing, I2cTiming};
use crate::target::{GpioDecl, GpioMode, Pull, TargetSpec};
use crate::{solve, Solution};

fn int(solution: &Solution<'_>, key: &str) -> Option<i64> {
    solution.settings.committed(key).unwrap().and_then(Literal::as_int)
}

fn symbol<'a>(solution: &'a Solution<'_>, key: &str) -> Option<&'a str> {
    solution.settings.committed(key).unwrap().and_then(Literal::as_symbol)
}

fn h533_board() -> TargetSpec {
    TargetSpec::new("nucleo", stm32h533::CHIP)
        .goal("PLL1P_CK", 250_000_000)
        .goal("PLL1Q_CK", 125_000_000)
        .goal("CPU_CK", 250_000_000)
        .goal("APB1_CK", 250_000_000)
        .goal("APB2_CK", 250_000_000)
        .goal("APB3_CK", 125_000_000)
        .goal("SYSTICK_CK", 1_000)
        .goal("USART2_BAUD", 1_000_000)
        .goal("I2C1_BAUD", 100_000)
        .goal("TIM2_RATE", 1_000)
        .goal("SPI1_BAUD", 31_250_000)
        .goal("SDMMC1_RATE", 31_250_000)
        .gpio(GpioDecl::new(
            "LED",
            Some("A5"),
            GpioMode::Output {
                initial_level: false,
                speed: None,
                open_drain: None,
            },
        ))
        .interrupt("TIM2", Some(3))
}

fn h7s3_board(baud: u64) -> TargetSpec {
    TargetSpec::new("disco", stm32h7s3::CHIP)
        .goal("PLL1P_CK", 500_000_000)
        .goal("CPU_CK", 500_000_000)
        .goal("AXI_AHB_CK", 250_000_000)
        .goal("APB1_CK", 125_000_000)
        .goal("APB2_CK", 125_000_000)
        .goal("APB4_CK", 125_000_000)
        .goal("APB5_CK", 125_000_000)
        .goal("USART2_BAUD", baud)
}

#[test]
fn cpu_at_250_mhz_through_pll1() {
    let schema = stm32h533::schema().unwrap();
    let solution = solve(&schema, &h533_board()).unwrap();

    assert_eq!(symbol(&solution, "PLL1_KERNEL_SOURCE"), Some("HSI_CK"));
    assert_eq!(int(&solution, "PLL1_PREDIVIDER"), Some(8));
    assert_eq!(int(&solution, "PLL1_MULTIPLIER"), Some(125));
    assert_eq!(int(&solution, "PLL1P_DIVIDER"), Some(2));
    assert_eq!(int(&solution, "PLL1Q_DIVIDER"), Some(4));
    assert_eq!(symbol(&solution, "SCGU_KERNEL_SOURCE"), Some("PLL1P_CK"));
    assert_eq!(int(&solution, "SYSTICK_RELOAD"), Some(249_999));
    assert_eq!(int(&solution, "USART2_BAUD_DIVIDER"), Some(250));
    assert_eq!(int(&solution, "TIM2_MODULATION"), Some(250_000));
    assert_eq!(symbol(&solution, "SPI1_KERNEL_SOURCE"), Some("PLL1Q_CK"));
    assert_eq!(int(&solution, "SPI1_BAUD_DIVIDER"), Some(4));
    assert_eq!(int(&solution, "SDMMC1_CLKDIV"), Some(2));
    assert_eq!(int(&solution, "I2C1_PRESC"), Some(4));
    assert_eq!(int(&solution, "INTERRUPT_TIM2_PRIORITY"), Some(3));
    assert_eq!(
        solution.settings.frequencies().get("AXI_AHB_CK"),
        Some(&Frequency::from_hz(250_000_000))
    );
}

#[test]
fn inexact_uart_baud_exhausts_the_group() {
    let schema = stm32h7s3::schema().unwrap();
    match solve(&schema, &h7s3_board(115_200)).unwrap_err() {
        SolveError::SearchExhausted { subsystem, chip, target } => {
            assert_eq!(subsystem, Subsystem::Uxart("UART234578".into()));
            assert_eq!(chip, stm32h7s3::CHIP);
            assert_eq!(target, "disco");
        }
        other => panic!("unexpected error: {other}"),
    }

    let solution = solve(&schema, &h7s3_board(1_000_000)).unwrap();
    assert_eq!(int(&solution, "PLL1_PREDIVIDER"), Some(16));
    assert_eq!(int(&solution, "PLL1P_DIVIDER"), Some(1));
    assert_eq!(symbol(&solution, "UART4_KERNEL_SOURCE"), Some("APB1_CK"));
    assert_eq!(int(&solution, "USART2_BAUD_DIVIDER"), Some(125));
}

#[test]
fn i2c_minimum_error_and_tolerance() {
    let kernel = Frequency::from_hz(16_000_000);
    let (error, timing) = best_timing(kernel, Frequency::from_hz(100_000), 0..=15, 1..=255)
        .into_inner()
        .unwrap();
    assert_eq!(timing, I2cTiming { presc: 0, scl: 80 });
    assert!(error < 0.01);

    let schema = stm32h533::schema().unwrap();
    let target = TargetSpec::new("i2c", stm32h533::CHIP)
        .goal("CPU_CK", 16_000_000)
        .goal("APB1_CK", 16_000_000)
        .goal("APB2_CK", 16_000_000)
        .goal("APB3_CK", 16_000_000)
        .goal("I2C1_BAUD", 1_000_000);
    match solve(&schema, &target).unwrap_err() {
        SolveError::ToleranceExceeded { subsystem, achieved, allowed, .. } => {
            assert_eq!(subsystem, Subsystem::I2c(1));
            assert!(achieved > allowed);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn pin_used_twice() {
    let schema = stm32h533::schema().unwrap();
    let target = h533_board().gpio(GpioDecl::new(
        "BUTTON",
        Some("A5"),
        GpioMode::Input { pull: Pull::Up },
    ));
    let err = solve(&schema, &target).unwrap_err();
    match &err {
        SolveError::DuplicateDeclaration { name, .. } => assert_eq!(name, "A5"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("A5"));
}

#[test]
fn unknown_key_has_suggestions() {
    let schema = stm32h533::schema().unwrap();
    match schema.resolve("PLL1_FOOBAR").unwrap_err() {
        SolveError::UnknownKey { key, suggestions, .. } => {
            assert_eq!(key, "PLL1_FOOBAR");
            assert!(!suggestions.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }

    let target = h533_board().goal("PLL1_FOOBAR", 1);
    assert!(matches!(
        solve(&schema, &target),
        Err(SolveError::UnknownKey { .. })
    ));
}

#[test]
fn systick_with_external_time_base() {
    let schema = stm32h533::schema().unwrap();
    let mut target = h533_board();
    target.external_time_base = true;
    match solve(&schema, &target).unwrap_err() {
        SolveError::ResourceConflict { resource, .. } => assert_eq!(resource, "SysTick"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unused_goal_leaves_channel_off() {
    let schema = stm32h533::schema().unwrap();
    let target = h533_board().unused("PLL1R_CK");
    let solution = solve(&schema, &target).unwrap();
    assert_eq!(
        solution.settings.committed("PLL1R_ENABLE").unwrap(),
        Some(&Literal::Bool(false))
    );
    assert!(solution.settings.committed("PLL1R_CK").unwrap().is_none());
}
