// Linear stage machine driving one update run on one device
use super::match_image::{Classification, ScreenClassifier};
use super::poller::{Check, Clock, Poller, TokioClock, WaitOutcome};
use super::types::{RunStage, ScreenState, TapTarget};
use crate::adb::{AdbClient, AdbError};
use crate::config::Config;
use crate::error::AutomationError;
use std::collections::BTreeSet;
use std::time::Duration;

/// Stages the config enables, in execution order.
pub fn plan_stages(config: &Config) -> Vec<RunStage> {
    RunStage::ALL
        .into_iter()
        .filter(|stage| match stage {
            RunStage::Uninstall => config.uninstall,
            RunStage::Install => config.install,
            RunStage::WaitForDownload => config.install && config.wait_for_download,
            _ => true,
        })
        .collect()
}

/// Screen states whose templates the planned stages cannot do without.
pub fn required_states(stages: &[RunStage]) -> BTreeSet<ScreenState> {
    stages
        .iter()
        .flat_map(|stage| stage.required_states().iter().copied())
        .collect()
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed {
        stage: RunStage,
        error: AutomationError,
    },
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Stages that were started, the failing one included
    pub executed: Vec<RunStage>,
    pub elapsed: Duration,
    pub last_state: ScreenState,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            RunOutcome::Completed => 0,
            RunOutcome::Failed { error, .. } => error.exit_code(),
        }
    }
}

pub struct RunController<'a, B: AdbClient, C: Clock = TokioClock> {
    config: &'a Config,
    device: &'a B,
    classifier: &'a ScreenClassifier,
    poller: Poller<C>,
    last_state: ScreenState,
    /// The store page was opened this run, so there is a download to wait on
    store_opened: bool,
}

impl<'a, B: AdbClient, C: Clock> RunController<'a, B, C> {
    pub fn new(
        config: &'a Config,
        device: &'a B,
        classifier: &'a ScreenClassifier,
        poller: Poller<C>,
    ) -> Self {
        Self {
            config,
            device,
            classifier,
            poller,
            last_state: ScreenState::Unknown,
            store_opened: false,
        }
    }

    /// Execute every planned stage in order, stopping at the first failure.
    pub async fn run(&mut self) -> RunReport {
        let stages = plan_stages(self.config);
        let started = self.poller.clock().now();
        let mut executed = Vec::with_capacity(stages.len());
        log::info!(
            "🚀 Starting run on {} for {} ({} stages)",
            self.device.device_name(),
            self.config.package,
            stages.len()
        );

        for stage in stages {
            let result = if self.poller.is_stopped() {
                Err(AutomationError::Cancelled { stage })
            } else {
                executed.push(stage);
                log::info!("▶️ {}", stage);
                self.run_stage(stage).await
            };

            if let Err(error) = result {
                let elapsed = self.poller.clock().now().saturating_duration_since(started);
                log::error!(
                    "❌ Run failed in {} after {:.1}s (last screen {}): {}",
                    stage,
                    elapsed.as_secs_f32(),
                    self.last_state,
                    error
                );
                if let AutomationError::Bridge(e) = &error
                    && e.is_disconnect()
                {
                    log::error!("📵 {} looks disconnected", self.device.device_name());
                }
                return RunReport {
                    outcome: RunOutcome::Failed { stage, error },
                    executed,
                    elapsed,
                    last_state: self.last_state,
                };
            }
            log::info!("✅ {} done", stage);
        }

        if self.config.exit_when_done {
            log::info!("🛑 Closing {}", self.config.package);
            if let Err(e) = self.device.force_stop(&self.config.package).await {
                log::warn!("⚠️ Failed to close {}: {}", self.config.package, e);
            }
        }

        let elapsed = self.poller.clock().now().saturating_duration_since(started);
        log::info!("🎉 Run completed in {:.1}s", elapsed.as_secs_f32());
        RunReport {
            outcome: RunOutcome::Completed,
            executed,
            elapsed,
            last_state: self.last_state,
        }
    }

    async fn run_stage(&mut self, stage: RunStage) -> Result<(), AutomationError> {
        match stage {
            RunStage::Prepare => self.prepare().await,
            RunStage::Uninstall => self.uninstall().await,
            RunStage::Install => self.install().await,
            RunStage::WaitForDownload => self.wait_for_download().await,
            RunStage::Launch => self.launch().await,
            RunStage::NavigateConsent
            | RunStage::NavigateAgree
            | RunStage::NavigateAgreeAll
            | RunStage::NavigateMoveForward => self.navigate(stage).await,
            RunStage::WaitGameRunning => {
                let timeout = secs(self.config.timeouts.gakuen_running);
                self.wait_for_screen(
                    stage,
                    timeout,
                    &[ScreenState::GameRunning, ScreenState::CreditsScreen],
                )
                .await?;
                Ok(())
            }
        }
    }

    async fn prepare(&mut self) -> Result<(), AutomationError> {
        let (width, height) = self.device.screen_dimensions();
        if let Some(expected) = self.config.device.expected_resolution
            && !expected.matches(width, height)
        {
            return Err(AutomationError::UnexpectedDevice(format!(
                "screen is {}x{}, expected {}x{}",
                width, height, expected.width, expected.height
            )));
        }
        if let Some(rotation) = self.config.device.rotation {
            log::debug!("Locking rotation to {}", rotation);
            self.device.lock_rotation(rotation).await?;
        }
        log::info!(
            "📱 Device {} ({}x{})",
            self.device.device_name(),
            width,
            height
        );
        Ok(())
    }

    async fn uninstall(&mut self) -> Result<(), AutomationError> {
        let package = &self.config.package;
        if !self.device.is_installed(package).await? {
            log::info!("{} not installed, nothing to uninstall", package);
            return Ok(());
        }
        log::info!("🗑️ Uninstalling {}", package);
        if let Err(e) = self.device.uninstall(package).await {
            if self.device.is_installed(package).await? {
                return Err(e.into());
            }
            log::warn!("⚠️ Uninstall reported '{}' but {} is gone", e, package);
        }
        Ok(())
    }

    async fn install(&mut self) -> Result<(), AutomationError> {
        let package = &self.config.package;
        if self.device.is_installed(package).await? {
            log::info!("📦 {} already installed, skipping store install", package);
            return Ok(());
        }
        log::info!("🛒 Opening store page for {}", package);
        self.device.install_from_store(package).await?;
        self.store_opened = true;

        let timeout = secs(self.config.timeouts.download_start);
        let seen = self
            .wait_for_screen(
                RunStage::Install,
                timeout,
                &[ScreenState::PlayStoreInstallPrompt],
            )
            .await?;
        self.tap_screen(ScreenState::PlayStoreInstallPrompt, &seen)
            .await
    }

    async fn wait_for_download(&mut self) -> Result<(), AutomationError> {
        if !self.store_opened {
            log::info!("No store install this run, nothing to wait for");
            return Ok(());
        }
        log::info!("⏳ Waiting for the store download to finish");
        let timeout = secs(self.config.timeouts.download_finish);
        let this = &*self;
        let package = &this.config.package;
        let outcome = this
            .poller
            .wait_for(timeout, move || async move {
                let seen = this.observe().await?;
                let finished = seen.state != ScreenState::Downloading
                    && this.device.is_installed(package).await?;
                Ok::<_, AutomationError>(if finished {
                    Check::Done(seen)
                } else {
                    Check::Pending(seen)
                })
            })
            .await?;
        self.settle(RunStage::WaitForDownload, outcome)?;
        self.device.press_home().await?;
        Ok(())
    }

    /// Start the game fresh, wait for it to show its loading art or setup
    /// splash, then for the splash itself, and tap it.
    async fn launch(&mut self) -> Result<(), AutomationError> {
        let config = self.config;
        let package = &config.package;
        if !self.device.is_installed(package).await? {
            if !self.store_opened {
                return Err(AutomationError::UnexpectedDevice(format!(
                    "{} is not installed",
                    package
                )));
            }
            self.wait_for_install().await?;
        }
        self.device.force_stop(package).await?;
        log::info!("🎮 Launching {}", package);
        self.device.launch_app(package).await?;

        let started = secs(config.timeouts.detect_setup_screen);
        let seen = self
            .wait_for_game(started, &[ScreenState::Loading, ScreenState::Setup])
            .await?;
        let seen = if seen.state == ScreenState::Setup {
            seen
        } else {
            log::info!("⏳ {} is loading", package);
            let loaded = secs(config.timeouts.detect_credit_screen);
            self.wait_for_game(loaded, &[ScreenState::Setup]).await?
        };
        self.tap_screen(ScreenState::Setup, &seen).await
    }

    /// The store download was not waited on: the package shows up once it
    /// finishes.
    async fn wait_for_install(&self) -> Result<(), AutomationError> {
        let package = &self.config.package;
        log::info!("⏳ Waiting for {} to finish installing", package);
        let timeout = secs(self.config.timeouts.download_finish);
        let device = self.device;
        let outcome = self
            .poller
            .wait_until(timeout, move || async move {
                Ok::<_, AutomationError>(device.is_installed(package).await?)
            })
            .await?;
        match outcome {
            WaitOutcome::Success(()) => Ok(()),
            WaitOutcome::TimedOut { elapsed, .. } => Err(AutomationError::StageTimeout {
                stage: RunStage::Launch,
                last_state: self.last_state,
                elapsed,
            }),
            WaitOutcome::Cancelled { .. } => Err(AutomationError::Cancelled {
                stage: RunStage::Launch,
            }),
        }
    }

    /// Poll for one of `targets` while the game starts up, launching it again
    /// whenever its process has died.
    async fn wait_for_game(
        &mut self,
        timeout: Duration,
        targets: &[ScreenState],
    ) -> Result<Classification, AutomationError> {
        let this = &*self;
        let package = &this.config.package;
        let outcome = this
            .poller
            .wait_for(timeout, move || async move {
                let seen = this.observe().await?;
                let done = targets.contains(&seen.state);
                if !done && !this.device.is_process_running(package).await? {
                    log::info!("🔁 {} not running, launching again", package);
                    this.device.launch_app(package).await?;
                }
                Ok::<_, AutomationError>(if done {
                    Check::Done(seen)
                } else {
                    Check::Pending(seen)
                })
            })
            .await?;
        self.settle(RunStage::Launch, outcome)
    }

    /// MoveForward sits behind the in-game data download, which only keeps
    /// going while the screen is tapped.
    async fn navigate(&mut self, stage: RunStage) -> Result<(), AutomationError> {
        let Some(target) = stage.navigation_target() else {
            return Ok(());
        };
        let downloading = target == ScreenState::MoveForward;
        let default = if downloading {
            self.config.timeouts.download_finish
        } else {
            self.config.timeouts.detect_credit_screen
        };
        let timeout = self
            .classifier
            .library()
            .get(target)
            .and_then(|t| t.spec.timeout)
            .unwrap_or_else(|| secs(default));
        let seen = if downloading {
            log::info!("⏳ Waiting for the game data download");
            self.wait_tapping(stage, timeout, target).await?
        } else {
            self.wait_for_screen(stage, timeout, &[target]).await?
        };
        self.tap_screen(target, &seen).await
    }

    async fn observe(&self) -> Result<Classification, AutomationError> {
        let screenshot = self.device.screenshot().await?;
        let seen = self.classifier.classify(&screenshot);
        log::debug!("Screen: {}", seen.state);
        Ok(seen)
    }

    async fn wait_for_screen(
        &mut self,
        stage: RunStage,
        timeout: Duration,
        targets: &[ScreenState],
    ) -> Result<Classification, AutomationError> {
        let this = &*self;
        let outcome = this
            .poller
            .wait_for(timeout, move || async move {
                let seen = this.observe().await?;
                Ok::<_, AutomationError>(if targets.contains(&seen.state) {
                    Check::Done(seen)
                } else {
                    Check::Pending(seen)
                })
            })
            .await?;
        self.settle(stage, outcome)
    }

    /// Like `wait_for_screen`, tapping the middle of the screen on every poll
    /// that does not show `target`.
    async fn wait_tapping(
        &mut self,
        stage: RunStage,
        timeout: Duration,
        target: ScreenState,
    ) -> Result<Classification, AutomationError> {
        let this = &*self;
        let outcome = this
            .poller
            .wait_for(timeout, move || async move {
                let seen = this.observe().await?;
                Ok::<_, AutomationError>(if seen.state == target {
                    Check::Done(seen)
                } else {
                    let (x, y) = seen.center();
                    log::debug!("Tapping ({}, {}) while {} downloads", x, y, this.config.package);
                    this.device.tap(x, y).await?;
                    Check::Pending(seen)
                })
            })
            .await?;
        self.settle(stage, outcome)
    }

    /// Record the last observation and turn a wait outcome into a stage result.
    fn settle(
        &mut self,
        stage: RunStage,
        outcome: WaitOutcome<Classification>,
    ) -> Result<Classification, AutomationError> {
        match outcome {
            WaitOutcome::Success(seen) => {
                self.last_state = seen.state;
                log::info!("👀 Saw {}", seen.state);
                Ok(seen)
            }
            WaitOutcome::TimedOut { last, elapsed } => {
                if let Some(seen) = last {
                    self.last_state = seen.state;
                }
                Err(AutomationError::StageTimeout {
                    stage,
                    last_state: self.last_state,
                    elapsed,
                })
            }
            WaitOutcome::Cancelled { last } => {
                if let Some(seen) = last {
                    self.last_state = seen.state;
                }
                Err(AutomationError::Cancelled { stage })
            }
        }
    }

    /// Where the declared tap target of `state` lands on this screenshot, in
    /// the screenshot's own frame.
    fn tap_point(&self, state: ScreenState, seen: &Classification) -> Option<(u32, u32)> {
        let template = self.classifier.library().get(state)?;
        match template.spec.tap {
            TapTarget::TemplateCenter => seen
                .score_of(state)
                .and_then(|s| s.matched.as_ref())
                .map(|m| m.center()),
            TapTarget::ScreenCenter => Some(seen.center()),
            TapTarget::Fixed { x, y } => Some((x, y)),
            TapTarget::None => None,
        }
    }

    async fn tap_screen(
        &self,
        state: ScreenState,
        seen: &Classification,
    ) -> Result<(), AutomationError> {
        match self.tap_point(state, seen) {
            Some((x, y)) if !seen.contains(x, y) => {
                return Err(AdbError::TapOutOfBounds {
                    x,
                    y,
                    width: seen.width,
                    height: seen.height,
                }
                .into());
            }
            Some((x, y)) => {
                log::info!("👆 Tapping {} at ({}, {})", state, x, y);
                self.device.tap(x, y).await?;
            }
            None => log::debug!("{} has no tap target", state),
        }
        Ok(())
    }
}

fn secs(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
