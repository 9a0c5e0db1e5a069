/*!
 * GUI application for bls-explorer - BLS time series search, fetch and export
 *
 * A cross-platform desktop application providing an interface for:
 * - Browsing BLS surveys and searching series by keyword
 * - Fetching series by id, optionally restricted to a year range
 * - Exporting the result table and viewing code that reproduces the request
 *
 * Platform support: Windows, macOS, Linux
 */

use bls_explorer::config::Settings;
use bls_explorer::models::{QueryMode, Survey};
use bls_explorer::query::{RawFields, ValidationRules, split_ids};
use bls_explorer::snippet::{SnippetLanguage, SnippetOptions};
use bls_explorer::storage::{self, ExportOptions};
use bls_explorer::{BlsClient, QueryOutcome, Session, ShapedTable, run_query};
use eframe::egui;
use std::sync::mpsc;
use std::thread;

const ACCENT: egui::Color32 = egui::Color32::from_rgb(0x00, 0x6F, 0x96);

fn main() -> Result<(), eframe::Error> {
    // Enable logging for better debugging
    env_logger::init();

    let settings = Settings::load().unwrap_or_else(|e| {
        log::warn!("falling back to default settings: {:#}", e);
        Settings::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 760.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("BLS API Explorer"),
        ..Default::default()
    };

    eframe::run_native(
        "BLS API Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(ExplorerApp::new(settings)))),
    )
}

/// Main application state
struct ExplorerApp {
    settings: Settings,
    rules: ValidationRules,

    // Input fields
    mode: QueryMode,
    keyword: String,
    series: String,
    year_from: i32,
    year_until: i32,
    api_key: String,

    // Output options
    sanitize_formulas: bool,
    snippet_language: SnippetLanguage,

    // Results
    session: Session,
    surveys: Vec<Survey>,
    survey_filter: String,

    // UI state
    is_loading: bool,
    status_message: String,
    error_message: String,

    // Background operation
    operation_receiver: Option<mpsc::Receiver<OperationResult>>,
}

#[derive(Debug)]
enum OperationResult {
    Query(Result<QueryOutcome, String>),
    Surveys(Result<Vec<Survey>, String>),
}

impl ExplorerApp {
    fn new(settings: Settings) -> Self {
        let rules = settings.validation_rules().unwrap_or_else(|e| {
            log::warn!("invalid validation settings, using defaults: {:#}", e);
            ValidationRules::default()
        });
        let latest = rules.max_year() - rules.max_year_ahead;

        Self {
            settings,
            rules,

            mode: QueryMode::Search,
            keyword: String::new(),
            series: String::new(),
            year_from: latest - 5,
            year_until: latest,
            api_key: String::new(),

            sanitize_formulas: false,
            snippet_language: SnippetLanguage::Python,

            session: Session::new(),
            surveys: Vec::new(),
            survey_filter: String::new(),

            is_loading: false,
            status_message: String::new(),
            error_message: String::new(),
            operation_receiver: None,
        }
    }

    /// Settings with the key typed into the form taking precedence.
    fn effective_settings(&self) -> Settings {
        let mut s = self.settings.clone();
        if !self.api_key.trim().is_empty() {
            s.api_key = Some(self.api_key.trim().to_string());
        }
        s
    }

    fn raw_fields(&self) -> RawFields {
        RawFields {
            mode: Some(self.mode),
            keyword: self.keyword.clone(),
            series: self.series.clone(),
            start: self.year_from.to_string(),
            end: self.year_until.to_string(),
        }
    }

    fn start_query(&mut self) {
        self.session.clear();
        self.is_loading = true;
        self.error_message.clear();
        self.status_message = "Fetching data from the BLS API...".to_string();

        let (sender, receiver) = mpsc::channel();
        self.operation_receiver = Some(receiver);

        // Clone the data we need for the background thread
        let settings = self.effective_settings();
        let rules = self.rules.clone();
        let fields = self.raw_fields();

        thread::spawn(move || {
            let result = BlsClient::new(&settings)
                .map_err(|e| e.to_string())
                .and_then(|client| run_query(&client, &rules, &fields).map_err(|e| e.to_string()));
            let _ = sender.send(OperationResult::Query(result));
        });
    }

    fn start_survey_load(&mut self) {
        self.is_loading = true;
        self.error_message.clear();
        self.status_message = "Loading surveys...".to_string();

        let (sender, receiver) = mpsc::channel();
        self.operation_receiver = Some(receiver);
        let settings = self.effective_settings();

        thread::spawn(move || {
            let result = BlsClient::new(&settings)
                .and_then(|client| client.surveys())
                .map_err(|e| e.to_string());
            let _ = sender.send(OperationResult::Surveys(result));
        });
    }

    fn check_operation_result(&mut self) {
        if let Some(receiver) = &self.operation_receiver
            && let Ok(result) = receiver.try_recv()
        {
            self.is_loading = false;
            self.operation_receiver = None;

            match result {
                OperationResult::Query(Ok(outcome)) => {
                    self.status_message = format!(
                        "Retrieved {} row(s) for {}",
                        outcome.table.len(),
                        outcome.query.label()
                    );
                    self.error_message.clear();
                    self.session.set(outcome);
                }
                OperationResult::Surveys(Ok(mut surveys)) => {
                    surveys.sort_by(|a, b| a.abbreviation.cmp(&b.abbreviation));
                    self.status_message = format!("Loaded {} surveys", surveys.len());
                    self.surveys = surveys;
                }
                OperationResult::Query(Err(error)) | OperationResult::Surveys(Err(error)) => {
                    self.error_message = error;
                    self.status_message.clear();
                }
            }
        }
    }

    fn export(&mut self, json: bool) {
        let Some(outcome) = self.session.current() else {
            return;
        };
        let today = chrono::Local::now().date_naive();
        let extension = if json { "json" } else { "csv" };
        let name = storage::default_file_name_as(&outcome.query, today, extension);
        let dialog = rfd::FileDialog::new().set_file_name(&name);
        let dialog = if json {
            dialog.add_filter("JSON", &["json"])
        } else {
            dialog.add_filter("CSV", &["csv"])
        };
        let Some(path) = dialog.save_file() else {
            return;
        };

        let result = if json {
            self.session.export_json(&path)
        } else {
            self.session.export_csv(
                &path,
                ExportOptions {
                    sanitize_formulas: self.sanitize_formulas,
                },
            )
        };
        match result {
            Ok(n) => {
                self.status_message = format!("Saved {} rows to {}", n, path.display());
                self.error_message.clear();
            }
            Err(err) => self.error_message = err.to_string(),
        }
    }

    fn survey_panel(&mut self, ui: &mut egui::Ui) {
        ui.collapsing("Explore datasets", |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!self.is_loading, egui::Button::new("Load surveys"))
                    .clicked()
                {
                    self.start_survey_load();
                }
                ui.label("Filter:");
                ui.text_edit_singleline(&mut self.survey_filter);
            });

            let needle = self.survey_filter.trim().to_lowercase();
            let mut picked: Option<String> = None;
            egui::ScrollArea::vertical()
                .id_salt("surveys")
                .max_height(160.0)
                .show(ui, |ui| {
                    for s in &self.surveys {
                        if !needle.is_empty()
                            && !s.abbreviation.to_lowercase().contains(&needle)
                            && !s.name.to_lowercase().contains(&needle)
                        {
                            continue;
                        }
                        if ui
                            .selectable_label(false, format!("{}  {}", s.abbreviation, s.name))
                            .on_hover_text("Search this survey's popular series")
                            .clicked()
                        {
                            picked = Some(s.abbreviation.clone());
                        }
                    }
                });
            if let Some(abbr) = picked {
                self.mode = QueryMode::Search;
                self.keyword = abbr;
            }
        });
    }

    fn query_panel(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(egui::RichText::new("API Query Builder").color(ACCENT).strong());
            ui.add_space(5.0);

            ui.horizontal(|ui| {
                ui.label("Mode:");
                ui.radio_value(&mut self.mode, QueryMode::Search, "Search by keyword");
                ui.radio_value(&mut self.mode, QueryMode::SeriesById, "Series (latest)");
                ui.radio_value(&mut self.mode, QueryMode::SeriesByRange, "Series by year range");
            });

            match self.mode {
                QueryMode::Search => {
                    ui.horizontal(|ui| {
                        ui.label("Keyword:");
                        ui.text_edit_singleline(&mut self.keyword)
                            .on_hover_text("Survey name or abbreviation (e.g., unemployment, CU)");
                    });
                }
                QueryMode::SeriesById | QueryMode::SeriesByRange => {
                    ui.horizontal(|ui| {
                        ui.label("Series IDs:");
                        ui.text_edit_singleline(&mut self.series)
                            .on_hover_text("Separate several ids with commas (e.g., LNS14000000,CUUR0000SA0)");
                    });
                }
            }

            if self.mode == QueryMode::SeriesByRange {
                let (min, max) = (self.rules.min_year, self.rules.max_year());
                ui.horizontal(|ui| {
                    ui.label("Year range:");
                    ui.add(egui::DragValue::new(&mut self.year_from).range(min..=max));
                    ui.label("to");
                    ui.add(egui::DragValue::new(&mut self.year_until).range(min..=max));
                });
            }

            ui.horizontal(|ui| {
                ui.label("API key:");
                ui.add(egui::TextEdit::singleline(&mut self.api_key).password(true))
                    .on_hover_text("Register for a free key at https://data.bls.gov/registrationEngine/");
            });
        });
    }

    fn results_panel(&mut self, ui: &mut egui::Ui) {
        let Some(outcome) = self.session.current() else {
            return;
        };

        if outcome.messages.is_empty() {
            ui.colored_label(
                egui::Color32::DARK_GREEN,
                "SUCCESS! No log messages returned from the API.",
            );
        } else {
            for m in &outcome.messages {
                ui.colored_label(egui::Color32::from_rgb(0x85, 0x64, 0x04), m);
            }
        }
        ui.add_space(5.0);

        let mut use_series: Option<String> = None;
        let is_search = matches!(outcome.table, ShapedTable::Series(_));
        let fields = outcome.table.fields();
        let rows = outcome.table.rows();

        egui::ScrollArea::both()
            .id_salt("results")
            .max_height(320.0)
            .show(ui, |ui| {
                egui::Grid::new("results_grid").striped(true).show(ui, |ui| {
                    if is_search {
                        ui.label("");
                    }
                    for f in &fields {
                        ui.label(egui::RichText::new(*f).strong());
                    }
                    ui.end_row();
                    for row in &rows {
                        if is_search
                            && ui.small_button("Use").on_hover_text("Fetch this series").clicked()
                        {
                            use_series = row.first().cloned();
                        }
                        for cell in row {
                            ui.label(cell);
                        }
                        ui.end_row();
                    }
                });
            });

        if let Some(id) = use_series {
            let mut ids = split_ids(&self.series);
            if !ids.contains(&id) {
                ids.push(id);
            }
            self.series = ids.join(",");
            self.mode = QueryMode::SeriesByRange;
        }

        ui.add_space(5.0);
        ui.horizontal(|ui| {
            if ui.button("Download CSV File").clicked() {
                self.export(false);
            }
            if ui.button("Download JSON File").clicked() {
                self.export(true);
            }
            ui.checkbox(&mut self.sanitize_formulas, "Guard against spreadsheet formulas");
        });
    }

    fn snippet_panel(&mut self, ui: &mut egui::Ui) {
        let opts = SnippetOptions {
            language: self.snippet_language,
            // Only the user's own key is shown; a configured key stays hidden.
            api_key: Some(self.api_key.trim().to_string()).filter(|k| !k.is_empty()),
        };
        let Some(code) = self.session.snippet(&opts) else {
            return;
        };

        ui.add_space(10.0);
        ui.label(egui::RichText::new("Code").color(ACCENT).strong());
        ui.horizontal(|ui| {
            for lang in SnippetLanguage::ALL {
                ui.selectable_value(&mut self.snippet_language, lang, lang.name());
            }
            if ui.button("Copy").clicked() {
                ui.ctx().copy_text(code.clone());
            }
        });
        let mut view = code.as_str();
        ui.add(
            egui::TextEdit::multiline(&mut view)
                .code_editor()
                .desired_width(f32::INFINITY),
        );
    }
}

impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for completed background operations
        self.check_operation_result();

        // Request repaint if loading (for spinner animation)
        if self.is_loading {
            ctx.request_repaint();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading(egui::RichText::new("BLS API Explorer").color(ACCENT));
                ui.label(
                    egui::RichText::new(
                        "Not an official BLS product. BLS.gov cannot vouch for data or analyses \
                         derived from these data after retrieval.",
                    )
                    .small()
                    .color(egui::Color32::RED),
                );
                ui.add_space(10.0);

                self.survey_panel(ui);
                ui.add_space(10.0);
                self.query_panel(ui);
                ui.add_space(15.0);

                // Action buttons
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(!self.is_loading, egui::Button::new("Get Data"))
                        .clicked()
                    {
                        self.start_query();
                    }

                    if self.is_loading {
                        ui.spinner();
                        ui.label("Processing...");
                    }
                });

                ui.add_space(10.0);

                // Status messages
                if !self.status_message.is_empty() {
                    ui.colored_label(egui::Color32::DARK_GREEN, &self.status_message);
                }

                if !self.error_message.is_empty() {
                    ui.colored_label(egui::Color32::RED, &self.error_message);
                }

                ui.add_space(10.0);
                self.results_panel(ui);
                self.snippet_panel(ui);
            });
        });
    }
}
