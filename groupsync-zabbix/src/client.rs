//! `MonitoringProvider` over the Zabbix JSON-RPC API.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use groupsync_core::config::{MonitoringConfig, UserDefaults, UserField};
use groupsync_core::{
    GroupName, MonitoringGroup, MonitoringId, MonitoringProvider, MonitoringUser, NewUser,
    ProviderError,
};

use crate::password;
use crate::rpc::RpcClient;
use crate::transport::{Transport, UreqTransport};

#[derive(Debug, Deserialize)]
struct WireUser {
    userid: String,
    /// `alias` before 5.4, `username` after.
    #[serde(alias = "username")]
    alias: String,
}

impl From<WireUser> for MonitoringUser {
    fn from(u: WireUser) -> Self {
        MonitoringUser::new(u.userid, u.alias)
    }
}

#[derive(Debug, Deserialize)]
struct WireGroup {
    usrgrpid: String,
    name: String,
    #[serde(default)]
    users: Vec<WireUser>,
}

#[derive(Debug, Deserialize)]
struct CreatedGroups {
    usrgrpids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedUsers {
    userids: Vec<String>,
}

pub struct ZabbixClient<T = UreqTransport> {
    rpc: RpcClient<T>,
    user_field: UserField,
    defaults: UserDefaults,
    /// Set when the session came from `user.login` and must be closed.
    session: bool,
}

impl ZabbixClient<UreqTransport> {
    pub fn connect(config: &MonitoringConfig) -> Result<Self, ProviderError> {
        let transport = UreqTransport::new(&config.url, Duration::from_secs(config.timeout_secs));
        Self::open(transport, config)
    }
}

impl<T: Transport> ZabbixClient<T> {
    /// Authenticate over `transport`: the API token when configured, otherwise
    /// `user.login` with username and password.
    pub fn open(transport: T, config: &MonitoringConfig) -> Result<Self, ProviderError> {
        let mut client = Self {
            rpc: RpcClient::new(transport, config.auth),
            user_field: config.user_field,
            defaults: config.user_defaults.clone(),
            session: false,
        };

        if let Some(token) = config.api_token.as_ref().filter(|t| !t.is_empty()) {
            client.rpc.set_token(Some(token.clone()));
            debug!(endpoint = client.rpc.endpoint(), "using API token");
            return Ok(client);
        }

        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(ProviderError::Authentication {
                endpoint: client.rpc.endpoint().to_string(),
                message: "neither api_token nor username/password configured".into(),
            });
        };
        let login_field = match config.user_field {
            UserField::Alias => "user",
            UserField::Username => "username",
        };
        let mut params = Map::new();
        params.insert(login_field.into(), json!(username));
        params.insert("password".into(), json!(password));

        let token: String = client.call("user.login", Value::Object(params))?;
        client.rpc.set_token(Some(token));
        client.session = true;
        info!(endpoint = client.rpc.endpoint(), %username, "logged in to monitoring API");
        Ok(client)
    }

    /// End the session opened by [`open`](Self::open); no-op with an API token.
    pub fn close(mut self) -> Result<(), ProviderError> {
        if !self.session {
            return Ok(());
        }
        let _: Value = self.call("user.logout", json!([]))?;
        self.rpc.set_token(None);
        debug!("logged out of monitoring API");
        Ok(())
    }

    fn call<R: DeserializeOwned>(&mut self, method: &str, params: Value) -> Result<R, ProviderError> {
        let endpoint = self.rpc.endpoint().to_string();
        self.rpc
            .call(method, params)
            .map_err(|e| e.into_provider(&endpoint))
    }

    fn field(&self) -> &'static str {
        self.user_field.as_str()
    }
}

fn first_id(method: &str, ids: Vec<String>) -> Result<MonitoringId, ProviderError> {
    ids.into_iter()
        .next()
        .map(MonitoringId::from)
        .ok_or_else(|| ProviderError::Protocol(format!("{method} returned no id")))
}

impl<T: Transport> MonitoringProvider for ZabbixClient<T> {
    fn list_users(&mut self) -> Result<Vec<MonitoringUser>, ProviderError> {
        let users: Vec<WireUser> =
            self.call("user.get", json!({ "output": ["userid", self.field()] }))?;
        Ok(users.into_iter().map(MonitoringUser::from).collect())
    }

    fn list_user_groups(
        &mut self,
        include_members: bool,
    ) -> Result<Vec<MonitoringGroup>, ProviderError> {
        let mut params = json!({ "output": ["usrgrpid", "name"] });
        if include_members {
            params["selectUsers"] = json!(["userid", self.field()]);
        }
        let groups: Vec<WireGroup> = self.call("usergroup.get", params)?;
        Ok(groups
            .into_iter()
            .map(|g| {
                MonitoringGroup::new(
                    g.usrgrpid,
                    g.name,
                    g.users.into_iter().map(MonitoringUser::from).collect(),
                )
            })
            .collect())
    }

    fn find_user_group(&mut self, name: &GroupName) -> Result<MonitoringId, ProviderError> {
        let groups: Vec<WireGroup> = self.call(
            "usergroup.get",
            json!({ "output": ["usrgrpid", "name"], "filter": { "name": [name.0] } }),
        )?;
        if groups.len() > 1 {
            warn!(group = %name, matches = groups.len(), "several user groups share this name");
        }
        groups
            .into_iter()
            .find(|g| g.name == name.0)
            .map(|g| MonitoringId::from(g.usrgrpid))
            .ok_or_else(|| ProviderError::NotFound {
                kind: "user group",
                name: name.to_string(),
            })
    }

    fn create_user_group(&mut self, name: &GroupName) -> Result<MonitoringId, ProviderError> {
        let created: CreatedGroups = self.call("usergroup.create", json!({ "name": name.0 }))?;
        first_id("usergroup.create", created.usrgrpids)
    }

    fn create_user(&mut self, user: &NewUser) -> Result<MonitoringId, ProviderError> {
        let groups: Vec<Value> = user
            .group_ids
            .iter()
            .map(|id| json!({ "usrgrpid": id.0 }))
            .collect();
        let mut params = Map::new();
        params.insert(self.field().into(), json!(user.alias.0));
        params.insert("name".into(), json!(user.display_name));
        params.insert("passwd".into(), json!(password::generate()));
        params.insert("usrgrps".into(), Value::Array(groups));
        params.insert("refresh".into(), json!(self.defaults.refresh));
        params.insert("rows_per_page".into(), json!(self.defaults.rows_per_page));
        params.insert("lang".into(), json!(self.defaults.lang));

        let created: CreatedUsers = self.call("user.create", Value::Object(params))?;
        first_id("user.create", created.userids)
    }

    fn update_user_group_members(
        &mut self,
        group: &MonitoringId,
        members: &BTreeSet<MonitoringId>,
    ) -> Result<(), ProviderError> {
        let ids: Vec<&str> = members.iter().map(|id| id.0.as_str()).collect();
        // 5.4 replaced `userids` with a list of user objects.
        let params = match self.user_field {
            UserField::Alias => json!({ "usrgrpid": group.0, "userids": ids }),
            UserField::Username => {
                let users: Vec<Value> = ids.iter().map(|id| json!({ "userid": id })).collect();
                json!({ "usrgrpid": group.0, "users": users })
            }
        };
        let _: CreatedGroups = self.call("usergroup.update", params)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::Scripted;
    use groupsync_core::config::AuthMode;
    use groupsync_core::Alias;

    fn config() -> MonitoringConfig {
        MonitoringConfig {
            url: "http://zabbix.test".into(),
            username: Some("Admin".into()),
            password: Some("zabbix".into()),
            api_token: None,
            auth: AuthMode::Body,
            user_field: UserField::Alias,
            default_group: "AD Users".into(),
            user_defaults: UserDefaults::default(),
            timeout_secs: 5,
        }
    }

    fn logged_in(responses: Vec<Value>) -> (ZabbixClient<Scripted>, Scripted) {
        let mut script = vec![Scripted::ok(json!("token-1"))];
        script.extend(responses);
        let fake = Scripted::new(script);
        let client = ZabbixClient::open(fake.clone(), &config()).expect("login");
        (client, fake)
    }

    #[test]
    fn login_then_logout() {
        let (client, fake) = logged_in(vec![Scripted::ok(json!(true))]);
        client.close().expect("logout");

        assert_eq!(fake.methods(), vec!["user.login", "user.logout"]);
        let login = fake.sent(0).body;
        assert_eq!(login["params"]["user"], "Admin");
        assert_eq!(login["params"]["password"], "zabbix");
        assert_eq!(fake.sent(1).body["auth"], "token-1");
    }

    #[test]
    fn api_token_skips_login_and_logout() {
        let fake = Scripted::new(vec![Scripted::ok(json!([]))]);
        let mut cfg = config();
        cfg.api_token = Some("static".into());
        let mut client = ZabbixClient::open(fake.clone(), &cfg).expect("open");
        client.list_users().expect("users");
        client.close().expect("close");

        assert_eq!(fake.methods(), vec!["user.get"]);
        assert_eq!(fake.sent(0).body["auth"], "static");
    }

    #[test]
    fn rejected_login_is_authentication_error() {
        let fake = Scripted::new(vec![json!({
            "jsonrpc": "2.0",
            "error": {"code": -32602, "message": "Invalid params.", "data": "Incorrect user name or password."},
            "id": 1
        })]);
        let err = ZabbixClient::open(fake, &config()).err().expect("error");
        assert!(matches!(err, ProviderError::Authentication { .. }));
    }

    #[test]
    fn groups_are_read_with_members() {
        let (mut client, fake) = logged_in(vec![Scripted::ok(json!([
            {"usrgrpid": "7", "name": "Ops (AD)", "users": [{"userid": "3", "alias": "alice"}]},
            {"usrgrpid": "8", "name": "Guests", "users": []}
        ]))]);
        let groups = client.list_user_groups(true).expect("groups");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![MonitoringUser::new("3", "alice")]);
        assert_eq!(fake.sent(1).body["params"]["selectUsers"], json!(["userid", "alias"]));
    }

    #[test]
    fn username_field_is_used_on_newer_servers() {
        let fake = Scripted::new(vec![
            Scripted::ok(json!("tok")),
            Scripted::ok(json!([{"userid": "3", "username": "alice"}])),
        ]);
        let mut cfg = config();
        cfg.user_field = UserField::Username;
        let mut client = ZabbixClient::open(fake.clone(), &cfg).expect("login");
        let users = client.list_users().expect("users");

        assert_eq!(users[0].alias, Alias::from("alice"));
        assert_eq!(fake.sent(0).body["params"]["username"], "Admin");
        assert_eq!(fake.sent(1).body["params"]["output"], json!(["userid", "username"]));
    }

    #[test]
    fn missing_group_lookup_is_not_found() {
        let (mut client, _) = logged_in(vec![Scripted::ok(json!([]))]);
        let err = client.find_user_group(&GroupName::from("AD Users")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn create_user_sends_groups_and_defaults() {
        let (mut client, fake) = logged_in(vec![Scripted::ok(json!({"userids": ["42"]}))]);
        let id = client
            .create_user(&NewUser {
                alias: Alias::from("jdoe"),
                display_name: "Jane Doe".into(),
                group_ids: vec![MonitoringId::from("7"), MonitoringId::from("9")],
            })
            .expect("create");
        assert_eq!(id, MonitoringId::from("42"));

        let params = fake.sent(1).body["params"].clone();
        assert_eq!(params["alias"], "jdoe");
        assert_eq!(params["name"], "Jane Doe");
        assert_eq!(params["usrgrps"], json!([{"usrgrpid": "7"}, {"usrgrpid": "9"}]));
        assert_eq!(params["lang"], "en_US");
        assert_eq!(params["rows_per_page"], 100);
        let passwd = params["passwd"].as_str().expect("passwd");
        assert!((password::MIN_LEN..=password::MAX_LEN).contains(&passwd.len()));
    }

    #[test]
    fn membership_update_sends_full_id_list() {
        let (mut client, fake) = logged_in(vec![Scripted::ok(json!({"usrgrpids": ["7"]}))]);
        let members = BTreeSet::from([MonitoringId::from("3"), MonitoringId::from("12")]);
        client
            .update_user_group_members(&MonitoringId::from("7"), &members)
            .expect("update");

        let params = fake.sent(1).body["params"].clone();
        assert_eq!(params, json!({"usrgrpid": "7", "userids": ["12", "3"]}));
    }

    #[test]
    fn create_without_ids_is_protocol_error() {
        let (mut client, _) = logged_in(vec![Scripted::ok(json!({"usrgrpids": []}))]);
        let err = client.create_user_group(&GroupName::from("Ops (AD)")).unwrap_err();
        assert!(matches!(err, ProviderError::Protocol(_)));
    }
}
