#![no_std]
#![no_main]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::wildcard_imports)]

use defmt_rtt as _;
use panic_probe as _;
use rtic_fan::clock::{Clock, Instant};
use rtic_monotonics::{stm32::Tim2 as Mono, Monotonic};

/// Temperature the fan keeps the probe at, in degrees Celsius
const TARGET_TEMP: i32 = 35;
/// Slowest speed the fan reliably spins at
const MIN_SPEED: u8 = 40;
const MAX_SPEED: u8 = 255;
/// Control loop period
const TICK_MS: u32 = 100;
/// Telemetry period, 0 disables telemetry
const LOGGING_INTERVAL_MS: u32 = 5_000;
const SENSOR_NAME: &str = "fan";

static_assertions::const_assert!(MIN_SPEED <= MAX_SPEED);
static_assertions::const_assert!(LOGGING_INTERVAL_MS == 0 || LOGGING_INTERVAL_MS >= TICK_MS);

/// Millisecond view of the TIM2 monotonic
pub struct MonoClock;

impl Clock for MonoClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now(&self) -> Instant {
        // Truncating to u32 wraps, which the reader's interval check handles
        Instant::from_ticks(Mono::now().duration_since_epoch().to_millis() as u32)
    }
}

#[rtic::app(device = stm32f0xx_hal::pac, dispatchers = [USART1, TIM14])]
mod app {
    use defmt::{unreachable, *};
    use rtic_fan::{
        clock::{Clock, Duration},
        fan::PwmFan,
        onewire::OneWire,
        reader::TemperatureReader,
        telemetry::{Sample, Telemetry},
        thermometer::{ds18b20::Ds18b20Thermometer, Temperature},
        FanConfig, FanController,
    };
    use rtic_monotonics::{
        stm32::{Tim2 as Mono, *},
        Monotonic,
    };
    use rtic_sync::{
        channel::{ReceiveError, Receiver, Sender},
        make_channel,
    };
    use stm32f0xx_hal::{
        delay::Delay,
        gpio::{
            gpioa::{PA15, PA2},
            Alternate, OpenDrain, Output, Pin, AF1,
        },
        pac::{IWDG, TIM3, USART2},
        prelude::*,
        pwm::{self, PwmChannels, C1},
        serial::Serial,
        watchdog::Watchdog,
    };

    use crate::{
        MonoClock, LOGGING_INTERVAL_MS, MAX_SPEED, MIN_SPEED, SENSOR_NAME, TARGET_TEMP, TICK_MS,
    };

    type Probe = Ds18b20Thermometer<Pin<Output<OpenDrain>>, Delay>;
    type Fan = PwmFan<PwmChannels<TIM3, C1>>;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        controller: FanController<Probe, MonoClock, Fan>,
        tx: Sender<'static, Sample, 1>,
        usart: Serial<USART2, PA2<Alternate<AF1>>, PA15<Alternate<AF1>>>,
        telemetry: Telemetry,
    }

    #[init]
    fn init(mut cx: init::Context) -> (Shared, Local) {
        // Set system clock to 24 MHz
        let mut rcc = cx
            .device
            .RCC
            .configure()
            .hsi48()
            .sysclk(24.mhz())
            .pclk(24.mhz())
            .hclk(24.mhz())
            .freeze(&mut cx.device.FLASH);

        trace!("sysclk: {}", rcc.clocks.sysclk().0);

        // Enable tim2 monotonic
        let token = rtic_monotonics::create_stm32_tim2_monotonic_token!();
        Mono::start(24_000_000, token);

        // Setup systick delay for one-wire timing
        let delay = Delay::new(cx.core.SYST, &rcc);

        let gpioa = cx.device.GPIOA.split(&mut rcc);

        let _ = watchdog::spawn(cx.device.IWDG);

        // Telemetry over USART2, 9600 baud
        let usart = Serial::usart2(
            cx.device.USART2,
            (
                gpioa.pa2.into_alternate_af1(&cx.cs),
                gpioa.pa15.into_alternate_af1(&cx.cs),
            ),
            9_600.bps(),
            &mut rcc,
        );

        // Fan on TIM3 CH1 (PA6) at 25 kHz
        let ch1 = pwm::tim3(
            cx.device.TIM3,
            gpioa.pa6.into_alternate_af1(&cx.cs),
            &mut rcc,
            25u32.khz(),
        );
        let fan = PwmFan::new(ch1);

        // Setup DS18B20
        let mut pa12 = gpioa.pa12.into_open_drain_output(&cx.cs);
        unwrap!(pa12.set_high());
        let mut probe = Ds18b20Thermometer::new(OneWire::new(pa12.downgrade()), delay);

        for device in probe.devices() {
            match device {
                Ok(addr) => info!("Found device: {}", addr),
                Err(e) => warn!("Device search: {=str}", e.as_str()),
            }
        }

        // Setup controller
        let config = unwrap!(FanConfig::new(
            Temperature::const_from_int(TARGET_TEMP),
            MIN_SPEED,
            MAX_SPEED
        ));
        let conversion_time = probe.resolution().conversion_time();
        let reader = TemperatureReader::with_interval(probe, MonoClock, conversion_time);
        let controller = FanController::new(reader, fan, config);

        // Setup telemetry
        let interval = (LOGGING_INTERVAL_MS > 0).then(|| Duration::millis(LOGGING_INTERVAL_MS));
        let telemetry = Telemetry::new(SENSOR_NAME, interval);
        let (tx, rx) = make_channel!(Sample, 1);

        let _ = fan_controller::spawn();
        let _ = report::spawn(rx);

        (
            Shared {},
            Local {
                controller,
                tx,
                usart,
                telemetry,
            },
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    #[task(priority = 1)]
    async fn watchdog(_: watchdog::Context, wdg: IWDG) {
        let mut wdg = Watchdog::new(wdg);
        wdg.start(1.hz());

        loop {
            wdg.feed();
            Mono::delay(100.millis()).await;
        }
    }

    #[task(priority = 2, local = [controller, tx])]
    async fn fan_controller(cx: fan_controller::Context) {
        let mut now = Mono::now();

        loop {
            let controller = &mut *cx.local.controller;
            if !controller.process() && !controller.sensor_present() {
                trace!("No temperature probe");
            }

            let sample = Sample {
                temperature: controller.temperature(),
            };
            // Telemetry still busy with the previous sample, skip this one
            let _ = cx.local.tx.try_send(sample);

            now += u64::from(TICK_MS).millis();
            Mono::delay_until(now).await;
        }
    }

    #[task(priority = 1, local = [usart, telemetry])]
    async fn report(cx: report::Context, mut rx: Receiver<'static, Sample, 1>) {
        loop {
            let sample = match rx.recv().await {
                Ok(sample) => sample,
                Err(ReceiveError::Empty) => continue,
                Err(ReceiveError::NoSender) => unreachable!("Sender dropped"),
            };

            let Some(line) = cx.local.telemetry.poll(MonoClock.now(), &sample) else {
                continue;
            };

            for b in line.bytes() {
                let _ = nb::block!(cx.local.usart.write(b));
            }
        }
    }

    timestamp!("{=u64:us}", {
        Mono::now().duration_since_epoch().to_micros()
    });
}
