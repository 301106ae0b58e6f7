//! The eframe application: owns the state, runs load effects on the tokio
//! runtime and feeds their results back on the UI thread.

use std::sync::Arc;

use eframe::egui::{self, Context};
use gv_core::{AppCommand, AppState, Effect, LoadEvent};
use gv_data::{Loader, ViewerConfig};
use gv_ui::{ShellConfig, Theme};
use gv_views::{MapView, SpaceView, TableView};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

pub struct ViewerApp {
    state: AppState,
    map: MapView,
    table: TableView,
    shell: ShellConfig,

    loader: Arc<Loader>,
    runtime: Runtime,
    events_tx: UnboundedSender<LoadEvent>,
    events_rx: UnboundedReceiver<LoadEvent>,
}

impl ViewerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: &ViewerConfig,
        runtime: Runtime,
        loader: Arc<Loader>,
        url: String,
    ) -> Self {
        gv_ui::apply_theme(&cc.egui_ctx, &Theme::default());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut app = Self {
            state: AppState::new(config.load_settings()),
            map: MapView::new("Map"),
            table: TableView::new("Rows"),
            shell: ShellConfig::default(),
            loader,
            runtime,
            events_tx,
            events_rx,
        };

        info!(%url, "opening initial file");
        let effects = app.state.dispatch(AppCommand::Open(url));
        app.run_effects(&cc.egui_ctx, effects);
        app
    }

    /// Apply every load result that arrived since the last frame
    fn drain_events(&mut self, ctx: &Context) {
        while let Ok(event) = self.events_rx.try_recv() {
            let effects = self.state.apply(event);
            self.run_effects(ctx, effects);
        }
    }

    fn dispatch(&mut self, ctx: &Context, commands: Vec<AppCommand>) {
        for command in commands {
            debug!(?command, "dispatch");
            let effects = self.state.dispatch(command);
            self.run_effects(ctx, effects);
        }
    }

    /// View effects go to the views; load effects run as tasks whose result
    /// comes back through the event channel
    fn run_effects(&mut self, ctx: &Context, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Discover { .. } | Effect::FetchPage { .. } => self.spawn_load(ctx, effect),
                view_effect => {
                    self.map.on_effect(&view_effect);
                    self.table.on_effect(&view_effect);
                }
            }
        }
    }

    fn spawn_load(&self, ctx: &Context, effect: Effect) {
        let loader = Arc::clone(&self.loader);
        let events = self.events_tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            if let Some(event) = loader.run_isolated(effect).await {
                if events.send(event).is_err() {
                    debug!("viewer closed before the load finished");
                }
                ctx.request_repaint();
            }
        });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);

        let mut commands = Vec::new();
        if self.shell.show_menu_bar {
            commands.extend(gv_ui::menu_bar(ctx, &self.state));
        }
        if self.shell.show_status_bar {
            commands.extend(gv_ui::status_bar(ctx, &self.state, &self.shell));
        }

        egui::SidePanel::right("table_panel")
            .resizable(true)
            .default_width(520.0)
            .min_width(240.0)
            .show(ctx, |ui| {
                ui.heading(self.table.display_name());
                commands.extend(self.table.ui(&self.state, ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            commands.extend(self.map.ui(&self.state, ui));
        });

        commands.extend(gv_ui::show_modals(ctx, &self.state));
        self.dispatch(ctx, commands);

        if self.state.is_loading() {
            // Keep the spinner turning while tasks are in flight
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}
