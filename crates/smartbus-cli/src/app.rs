//! Shell state for SMARTBUS.
//!
//! `App` owns the core services and dispatches parsed commands. Input is
//! read on a blocking thread one line at a time so idle-expiry notices from
//! the monitor can be printed while the prompt is waiting.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use smartbus_core::auth::{
    ActivitySignal, IdleMonitor, InMemoryUserDirectory, Registration, SessionManager,
    SessionNotice, UserDirectory,
};
use smartbus_core::catalog::{InMemoryRouteCatalog, RouteCatalog};
use smartbus_core::clock::SystemClock;
use smartbus_core::config::Config;
use smartbus_core::faults::{FaultBoard, FaultFilter};
use smartbus_core::models::{Fault, OccupancyLevel};
use smartbus_core::offline::{DiskCacheStorage, HttpNetwork, OfflineController, OfflineManifest};
use smartbus_core::payments::{usd_equivalent, MobilePayment, PayPalWallets};
use smartbus_core::prefs::Preferences;
use smartbus_core::storage::{DeviceKey, EncryptedStore, FileStore, KeyValueStore};

use crate::input::{self, Command, HELP};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the activity and notice channels.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Number of transactions shown by `status`.
const RECENT_TRANSACTIONS: usize = 3;

/// Environment variable that pre-fills the login prompt.
const USERNAME_ENV: &str = "SMARTBUS_USERNAME";

type Store = Arc<dyn KeyValueStore>;
type Session = SessionManager<Store, InMemoryUserDirectory, SystemClock>;
pub type Controller = OfflineController<DiskCacheStorage, HttpNetwork>;

pub struct App {
    config: Config,
    session: Arc<Mutex<Session>>,
    activity_tx: Option<mpsc::Sender<ActivitySignal>>,
    notices_rx: mpsc::Receiver<SessionNotice>,
    monitor: Option<JoinHandle<()>>,

    catalog: InMemoryRouteCatalog,
    faults: FaultBoard,
    wallets: PayPalWallets,
    prefs: Preferences<Store>,
    offline: Arc<Controller>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let store = open_store(&config)?;

        let session = SessionManager::new(
            store.clone(),
            InMemoryUserDirectory::with_demo_users(),
            SystemClock,
        )
        .with_timeout(config.session_timeout());
        let session = Arc::new(Mutex::new(session));

        let (activity_tx, activity_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (notices_tx, notices_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let monitor = IdleMonitor::new(session.clone())
            .with_check_interval(config.idle_check_interval())
            .spawn(activity_rx, notices_tx);

        let offline = Arc::new(build_controller(&config)?);
        register_offline(offline.clone());

        Ok(Self {
            catalog: InMemoryRouteCatalog::demo().context("Failed to load route catalog")?,
            faults: FaultBoard::demo().context("Failed to load fault board")?,
            wallets: PayPalWallets::with_demo_accounts(),
            prefs: Preferences::new(store),
            config,
            session,
            activity_tx: Some(activity_tx),
            notices_rx,
            monitor: Some(monitor),
            offline,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("SMARTBUS {} - type 'help' for commands", env!("CARGO_PKG_VERSION"));
        self.restore_session().await;

        loop {
            let Some(line) = self.read_input("smartbus> ", false).await? else {
                break;
            };
            self.expire_if_idle().await;

            let command = match input::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            self.signal_activity(ActivitySignal::KeyPress);

            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.execute(command).await {
                println!("Error: {:#}", e);
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        // Closing the activity channel stops the monitor
        self.activity_tx.take();
        if let Some(monitor) = self.monitor.take() {
            if let Err(e) = monitor.await {
                warn!(error = %e, "Idle monitor ended abnormally");
            }
        }
        info!("Shell closed");
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
            Command::Login(username) => self.login(username).await?,
            Command::Logout => self.logout().await,
            Command::Register => self.register().await?,
            Command::Status => self.status().await,
            Command::History => self.history().await,
            Command::RechargeMobile(amount) => self.recharge_mobile(amount).await?,
            Command::RechargePaypal(amount) => self.recharge_paypal(amount).await?,
            Command::Routes(query) => self.routes(query.as_deref()),
            Command::Route(id) => self.route(&id)?,
            Command::Bus(id) => self.bus(&id)?,
            Command::Faults(filter) => {
                if self.require_admin().await {
                    self.fault_board(filter);
                }
            }
            Command::Fault(id) => {
                if self.require_admin().await {
                    self.fault(&id);
                }
            }
            Command::Resolve(id) => {
                if self.require_admin().await {
                    let fault = self.faults.resolve(&id)?;
                    println!("Fault {} on bus {} marked completed", fault.id, fault.bus_id);
                }
            }
            Command::DarkMode => {
                let enabled = self.prefs.toggle_dark_mode()?;
                println!("Dark mode {}", if enabled { "on" } else { "off" });
            }
            Command::Cache => self.cache_status().await?,
            Command::Version => println!("{}", self.offline.version().version_name()),
        }
        Ok(())
    }

    // =========================================================================
    // Input and notices
    // =========================================================================

    /// Read one line, printing session notices while waiting. `None` on EOF.
    async fn read_input(&mut self, prompt: &str, hidden: bool) -> Result<Option<String>> {
        let prompt = prompt.to_string();
        let mut handle = tokio::task::spawn_blocking(move || -> io::Result<Option<String>> {
            if hidden {
                return rpassword::prompt_password(prompt).map(Some);
            }
            print!("{}", prompt);
            io::stdout().flush()?;
            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        });

        loop {
            tokio::select! {
                result = &mut handle => return Ok(result??),
                Some(notice) = self.notices_rx.recv() => Self::show_notice(&notice),
            }
        }
    }

    async fn prompt(&mut self, label: &str) -> Result<String> {
        let value = self
            .read_input(&format!("{}: ", label), false)
            .await?
            .unwrap_or_default();
        Ok(value)
    }

    async fn prompt_password(&mut self, label: &str) -> Result<String> {
        let value = self
            .read_input(&format!("{}: ", label), true)
            .await?
            .unwrap_or_default();
        Ok(value)
    }

    fn show_notice(notice: &SessionNotice) {
        println!("\n*** {} ***", notice.message());
    }

    fn signal_activity(&self, signal: ActivitySignal) {
        if let Some(ref tx) = self.activity_tx {
            if tx.try_send(signal).is_err() {
                debug!("Activity channel full, signal dropped");
            }
        }
    }

    /// Catch an expiry the periodic check has not reported yet.
    async fn expire_if_idle(&mut self) {
        let mut session = self.session.lock().await;
        let username = session.user().map(|u| u.username.clone());
        if session.check_idle() {
            if let Some(username) = username {
                Self::show_notice(&SessionNotice::Expired { username });
            }
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    async fn restore_session(&mut self) {
        let mut session = self.session.lock().await;
        if session.restore() {
            if let Some(user) = session.user() {
                println!("Welcome back, {}", user.display_name());
            }
        }
    }

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        if let Some(user) = self.session.lock().await.user() {
            println!("Already logged in as {}", user.username);
            return Ok(());
        }

        let username = match username {
            Some(username) => username,
            None => {
                let default = std::env::var(USERNAME_ENV)
                    .ok()
                    .filter(|u| !u.trim().is_empty())
                    .or(self.session.lock().await.remembered_username());
                let typed = match default {
                    Some(ref default) => self.prompt(&format!("Username [{}]", default)).await?,
                    None => self.prompt("Username").await?,
                };
                match (typed.trim().is_empty(), default) {
                    (true, Some(default)) => default,
                    _ => typed,
                }
            }
        };
        let password = self.prompt_password("Password").await?;

        let mut session = self.session.lock().await;
        if session.login(&username, &password).await? {
            let Some(user) = session.user() else {
                return Ok(());
            };
            println!("Welcome, {}", user.display_name());
            if user.is_admin() {
                println!("Admin board: faults [filter], fault <id>, resolve <id>");
            }
        } else {
            println!("Invalid username or password");
        }
        Ok(())
    }

    async fn logout(&mut self) {
        let mut session = self.session.lock().await;
        if session.is_authenticated() {
            session.logout();
            println!("Logged out");
        } else {
            println!("Not logged in");
        }
    }

    async fn register(&mut self) -> Result<()> {
        let registration = Registration {
            first_name: self.prompt("First name").await?,
            last_name: self.prompt("Last name").await?,
            email: self.prompt("Email").await?,
            phone: self.prompt("Phone (809-123-4567)").await?,
            username: self.prompt("Username").await?,
            password: self.prompt_password("Password").await?,
            confirm_password: self.prompt_password("Confirm password").await?,
        };

        let session = self.session.lock().await;
        match session.directory().register(registration) {
            Ok(user) => println!("Account {} created, you can now log in", user.username),
            Err(e) => println!("{}", e),
        }
        Ok(())
    }

    async fn status(&self) {
        let session = self.session.lock().await;
        let Some(user) = session.user() else {
            println!("Not logged in");
            return;
        };

        println!("User:     {}", user.display_name());
        let balance = session.balance();
        println!(
            "Balance:  RD$ {:.2} (USD {:.2})",
            balance,
            usd_equivalent(balance)
        );
        if let Some(left) = session.time_until_expiry() {
            println!(
                "Session:  expires in {}:{:02} without activity",
                left.num_minutes(),
                left.num_seconds() % 60
            );
        }
        let recent = session.transactions();
        if !recent.is_empty() {
            println!("Recent top-ups:");
            for transaction in recent.iter().take(RECENT_TRANSACTIONS) {
                println!(
                    "  {}  RD$ {:.2} via {}",
                    transaction.date.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
                    transaction.amount,
                    transaction.method.display_name()
                );
            }
        }
    }

    async fn history(&self) {
        let session = self.session.lock().await;
        if !session.is_authenticated() {
            println!("Not logged in");
            return;
        }
        let transactions = session.transactions();
        if transactions.is_empty() {
            println!("No top-ups yet");
            return;
        }
        for transaction in transactions {
            println!(
                "{}  {:<18} {:>10.2} RD$  [{}]  {}",
                transaction.date.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
                transaction.method.display_name(),
                transaction.amount,
                transaction.currency,
                transaction.id
            );
        }
    }

    async fn require_login(&self) -> bool {
        let logged_in = self.session.lock().await.is_authenticated();
        if !logged_in {
            println!("Please log in first");
        }
        logged_in
    }

    async fn require_admin(&self) -> bool {
        let is_admin = self
            .session
            .lock()
            .await
            .user()
            .map(|u| u.is_admin())
            .unwrap_or(false);
        if !is_admin {
            println!("Admin only");
        }
        is_admin
    }

    // =========================================================================
    // Payments
    // =========================================================================

    async fn recharge_mobile(&mut self, amount: String) -> Result<()> {
        if !self.require_login().await {
            return Ok(());
        }
        let full_name = self.prompt("Full name").await?;
        let phone = self.prompt("Phone (809-123-4567)").await?;
        let payment = MobilePayment::new(amount, full_name, phone);

        let mut session = self.session.lock().await;
        match payment.pay(&mut *session) {
            Ok(transaction) => println!(
                "Mobile payment processed: RD$ {:.2}. New balance RD$ {:.2}",
                transaction.amount,
                session.balance()
            ),
            Err(e) => println!("{}", e),
        }
        Ok(())
    }

    async fn recharge_paypal(&mut self, amount: String) -> Result<()> {
        if !self.require_login().await {
            return Ok(());
        }
        let email = self.prompt("PayPal email").await?;
        let password = self.prompt_password("PayPal password").await?;
        let account = match self.wallets.sign_in(&email, &password) {
            Ok(account) => account,
            Err(e) => {
                println!("{}", e);
                return Ok(());
            }
        };
        println!(
            "Signed in as {} (USD {:.2} available)",
            account.name, account.balance
        );

        let mut session = self.session.lock().await;
        match self.wallets.pay(&account.email, &amount, &mut *session) {
            Ok(receipt) => println!(
                "PayPal payment completed: USD {:.2} (RD$ {:.2}). Remaining USD {:.2}",
                receipt.usd_charged, receipt.transaction.amount, receipt.remaining_usd
            ),
            Err(e) => println!("{}", e),
        }
        Ok(())
    }

    // =========================================================================
    // Routes
    // =========================================================================

    fn routes(&self, query: Option<&str>) {
        let routes = self.catalog.search(query.unwrap_or_default());
        if routes.is_empty() {
            println!("No routes match");
            return;
        }
        for route in routes {
            println!(
                "{:<6} {:<45} next in {:>2} min, {} buses, {} seats",
                route.id, route.name, route.next_arrival, route.active_buses, route.available_seats
            );
        }
    }

    fn route(&self, id: &str) -> Result<()> {
        let route = self.catalog.require_route(id)?;
        println!("{} ({})", route.name, route.id);
        println!("{}", route.description);
        println!(
            "Every {} | {} | trip {}",
            route.frequency, route.schedule, route.estimated_time
        );
        println!("Stops:");
        for (i, stop) in route.stops.iter().enumerate() {
            println!("  {}. {}", i + 1, stop);
        }
        println!("Buses:");
        for bus in self.catalog.buses_for_route(&route.id) {
            println!(
                "  {}  next stop {} in {} min, {}/{} aboard, {}",
                bus.id,
                bus.next_stop,
                bus.estimated_arrival,
                bus.occupancy,
                bus.capacity,
                bus.status.display_name()
            );
        }
        Ok(())
    }

    fn bus(&self, id: &str) -> Result<()> {
        let bus = self.catalog.require_bus(id)?;
        let level = match bus.occupancy_level() {
            OccupancyLevel::Low => "low",
            OccupancyLevel::Medium => "medium",
            OccupancyLevel::High => "high",
        };
        println!("Bus {} on {}", bus.id, bus.route_id);
        println!("Driver:    {}", bus.driver);
        println!("Status:    {}", bus.status.display_name());
        println!("Next stop: {} in {} min", bus.next_stop, bus.estimated_arrival);
        println!(
            "Occupancy: {}/{} ({}%, {}), {} seats free",
            bus.occupancy,
            bus.capacity,
            bus.occupancy_percent(),
            level,
            bus.free_seats()
        );
        println!("Position:  {:.4}, {:.4}", bus.coordinates.0, bus.coordinates.1);
        Ok(())
    }

    // =========================================================================
    // Fault board
    // =========================================================================

    fn fault_board(&self, filter: FaultFilter) {
        let stats = self.faults.stats();
        println!(
            "Critical {} | Medium {} | Low {} | Resolved {}",
            stats.critical, stats.medium, stats.low, stats.resolved
        );
        let faults = self.faults.filtered(filter);
        if faults.is_empty() {
            println!("No {} faults", filter.as_str());
        }
        for fault in &faults {
            print_fault_line(fault);
        }
        if filter == FaultFilter::Pending {
            println!("Bus performance:");
            for record in self.faults.performance() {
                println!(
                    "  {}  {:?}  efficiency {}%  last maintenance {}  ({} high, {} medium, {} low)",
                    record.id,
                    record.status,
                    record.efficiency,
                    record.maintenance,
                    record.high,
                    record.medium,
                    record.low
                );
            }
        }
    }

    fn fault(&self, id: &str) {
        let Some(fault) = self.faults.get(id) else {
            println!("Fault not found: {}", id);
            return;
        };
        print_fault_line(&fault);
        println!("  {} {}", fault.date, fault.time);
        if let Some(ref route) = fault.route {
            println!("  Route:  {}", route);
        }
        if let Some(ref driver) = fault.driver {
            println!("  Driver: {}", driver);
        }
        if let Some(ref details) = fault.details {
            println!("  {}", details);
        }
    }

    // =========================================================================
    // Offline cache
    // =========================================================================

    async fn cache_status(&self) -> Result<()> {
        println!(
            "Offline cache {} ({:?}), origin {}",
            self.offline.version().version_name(),
            self.offline.state(),
            self.config.origin
        );
        let partitions = self.offline.storage().partition_info().await?;
        if partitions.is_empty() {
            println!("  No cache partitions yet; run with --warm-cache");
        }
        for partition in partitions {
            println!(
                "  {:<28} {:>3} entries, {:>9} bytes, updated {}",
                partition.name,
                partition.entries,
                partition.bytes,
                partition
                    .updated_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
            );
        }
        Ok(())
    }
}

fn print_fault_line(fault: &Fault) {
    println!(
        "{:<10} {:<8} {:<17} {:<7} {:<9} {}",
        fault.id,
        fault.bus_id,
        fault.fault_type.display_name(),
        format!("{:?}", fault.priority),
        format!("{:?}", fault.status),
        fault.description
    );
}

/// Open the key-value store, sealed with the device key when configured.
fn open_store(config: &Config) -> Result<Store> {
    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let file = FileStore::new(&data_dir);

    if config.encrypt_storage {
        let secret = DeviceKey::load_or_create()?;
        let store = EncryptedStore::new(file, &secret)?;
        debug!(path = %data_dir.display(), "Using encrypted store");
        Ok(Arc::new(store))
    } else {
        Ok(Arc::new(file))
    }
}

pub fn build_controller(config: &Config) -> Result<Controller> {
    let storage = DiskCacheStorage::new(config.cache_dir()?)?;
    let manifest = OfflineManifest::new(&config.origin)?;
    Ok(OfflineController::new(storage, HttpNetwork::new()?, manifest))
}

/// Bring the offline controller up in the background, reusing a previous
/// install when one is complete.
fn register_offline(controller: Arc<Controller>) {
    tokio::spawn(async move {
        match controller.resume().await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => debug!(error = %e, "Resume failed"),
        }
        if let Err(e) = controller.start().await {
            info!(error = %e, "Offline cache not available");
        }
    });
}
