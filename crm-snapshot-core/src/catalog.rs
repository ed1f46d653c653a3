//! Static description of every entity and reference list the pipeline handles,
//! and the fixed order in which a run visits them.

use std::fmt;

use serde::{Serialize, Serializer};

/// Record-bearing CRM entities fetched for a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Leads,
    Deals,
    Contacts,
    Companies,
    Users,
}

/// Plain list endpoints: field definitions and small reference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceList {
    LeadFields,
    DealFields,
    Statuses,
    DealCategories,
}

/// How an entity's records become rows.
#[derive(Debug, Clone, Copy)]
pub enum Decoding {
    /// Custom fields are decoded against the schema fetched from `fields`,
    /// alongside a fixed list of standard fields copied verbatim.
    Schema {
        fields: ReferenceList,
        standard_fields: &'static [&'static str],
    },
    /// Records are written as returned.
    Passthrough,
}

/// Storage and decoding details for one entity.
#[derive(Debug)]
pub struct EntitySpec {
    /// Key in the run's count map.
    pub count_key: &'static str,
    /// Directory under the storage root prefix.
    pub dir: &'static str,
    /// File name stem; files are named `<date>_<stem>.<ext>`.
    pub stem: &'static str,
    /// Archive objects go under `<year>/<month>/`.
    pub partitioned: bool,
    /// Also archive the raw records as JSON in the raw bucket.
    pub raw_archive: bool,
    pub decoding: Decoding,
}

/// Storage details for one reference list.
#[derive(Debug)]
pub struct ReferenceSpec {
    /// Key in the run's count map; field definition lists are not counted.
    pub count_key: Option<&'static str>,
    /// Directory of the raw JSON copy in the raw bucket.
    pub raw_dir: &'static str,
    pub stem: &'static str,
    /// Directory of the columnar snapshot, if the list gets one.
    pub snapshot_dir: Option<&'static str>,
}

/// One step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FetchSchema,
    ProcessEntity(Entity),
    FetchReference(ReferenceList),
}

/// The order in which a run executes its steps.
pub const RUN_PLAN: [Step; 8] = [
    Step::FetchSchema,
    Step::ProcessEntity(Entity::Leads),
    Step::ProcessEntity(Entity::Deals),
    Step::ProcessEntity(Entity::Contacts),
    Step::FetchReference(ReferenceList::Statuses),
    Step::ProcessEntity(Entity::Companies),
    Step::FetchReference(ReferenceList::DealCategories),
    Step::ProcessEntity(Entity::Users),
];

/// Count keys in the order they are reported.
pub const COUNT_KEYS: [&str; 7] = [
    "leads",
    "deals",
    "contacts",
    "status_list",
    "company_list",
    "deal_category_list",
    "user_list",
];

pub const LEAD_STANDARD_FIELDS: &[&str] = &[
    "ID",
    "TITLE",
    "HONORIFIC",
    "NAME",
    "SECOND_NAME",
    "LAST_NAME",
    "COMPANY_TITLE",
    "COMPANY_ID",
    "CONTACT_ID",
    "IS_RETURN_CUSTOMER",
    "BIRTHDATE",
    "SOURCE_ID",
    "SOURCE_DESCRIPTION",
    "STATUS_ID",
    "STATUS_DESCRIPTION",
    "POST",
    "COMMENTS",
    "CURRENCY_ID",
    "OPPORTUNITY",
    "IS_MANUAL_OPPORTUNITY",
    "HAS_PHONE",
    "HAS_EMAIL",
    "HAS_IMOL",
    "ASSIGNED_BY_ID",
    "CREATED_BY_ID",
    "MODIFY_BY_ID",
    "DATE_CREATE",
    "DATE_MODIFY",
    "DATE_CLOSED",
    "STATUS_SEMANTIC_ID",
    "OPENED",
    "ORIGINATOR_ID",
    "ORIGIN_ID",
    "MOVED_BY_ID",
    "MOVED_TIME",
    "ADDRESS",
    "ADDRESS_2",
    "ADDRESS_CITY",
    "ADDRESS_POSTAL_CODE",
    "ADDRESS_REGION",
    "ADDRESS_PROVINCE",
    "ADDRESS_COUNTRY",
    "ADDRESS_COUNTRY_CODE",
    "ADDRESS_LOC_ADDR_ID",
    "UTM_SOURCE",
    "UTM_MEDIUM",
    "UTM_CAMPAIGN",
    "UTM_CONTENT",
    "UTM_TERM",
    "LAST_COMMUNICATION_TIME",
    "LAST_ACTIVITY_BY",
    "LAST_ACTIVITY_TIME",
];

pub const DEAL_STANDARD_FIELDS: &[&str] = &[
    "ID",
    "TITLE",
    "TYPE_ID",
    "STAGE_ID",
    "PROBABILITY",
    "CURRENCY_ID",
    "OPPORTUNITY",
    "IS_MANUAL_OPPORTUNITY",
    "TAX_VALUE",
    "LEAD_ID",
    "COMPANY_ID",
    "CONTACT_ID",
    "QUOTE_ID",
    "BEGINDATE",
    "CLOSEDATE",
    "ASSIGNED_BY_ID",
    "CREATED_BY_ID",
    "MODIFY_BY_ID",
    "DATE_CREATE",
    "DATE_MODIFY",
    "OPENED",
    "CLOSED",
    "COMMENTS",
    "ADDITIONAL_INFO",
    "LOCATION_ID",
    "CATEGORY_ID",
    "STAGE_SEMANTIC_ID",
    "IS_NEW",
    "IS_RECURRING",
    "IS_RETURN_CUSTOMER",
    "IS_REPEATED_APPROACH",
    "SOURCE_ID",
    "SOURCE_DESCRIPTION",
    "ORIGINATOR_ID",
    "ORIGIN_ID",
    "MOVED_BY_ID",
    "MOVED_TIME",
    "LAST_ACTIVITY_TIME",
    "UTM_SOURCE",
    "UTM_MEDIUM",
    "UTM_CAMPAIGN",
    "UTM_CONTENT",
    "UTM_TERM",
    "PARENT_ID_1078",
    "PARENT_ID_1088",
    "PARENT_ID_1098",
    "PARENT_ID_1102",
    "PARENT_ID_1116",
    "PARENT_ID_1122",
    "PARENT_ID_1126",
    "PARENT_ID_1138",
    "PARENT_ID_1142",
    "PARENT_ID_1152",
    "PARENT_ID_1156",
    "LAST_COMMUNICATION_TIME",
    "LAST_ACTIVITY_BY",
];

static LEADS: EntitySpec = EntitySpec {
    count_key: "leads",
    dir: "leads",
    stem: "leads_bitrix24",
    partitioned: false,
    raw_archive: false,
    decoding: Decoding::Schema {
        fields: ReferenceList::LeadFields,
        standard_fields: LEAD_STANDARD_FIELDS,
    },
};

static DEALS: EntitySpec = EntitySpec {
    count_key: "deals",
    dir: "deals",
    stem: "deals_bitrix24",
    partitioned: false,
    raw_archive: false,
    decoding: Decoding::Schema {
        fields: ReferenceList::DealFields,
        standard_fields: DEAL_STANDARD_FIELDS,
    },
};

static CONTACTS: EntitySpec = EntitySpec {
    count_key: "contacts",
    dir: "contacts",
    stem: "contacts_bitrix24",
    partitioned: true,
    raw_archive: true,
    decoding: Decoding::Passthrough,
};

static COMPANIES: EntitySpec = EntitySpec {
    count_key: "company_list",
    dir: "company_list",
    stem: "company_list_bitrix24",
    partitioned: true,
    raw_archive: true,
    decoding: Decoding::Passthrough,
};

static USERS: EntitySpec = EntitySpec {
    count_key: "user_list",
    dir: "user_list",
    stem: "user_list_bitrix24",
    partitioned: true,
    raw_archive: true,
    decoding: Decoding::Passthrough,
};

static LEAD_FIELDS: ReferenceSpec = ReferenceSpec {
    count_key: None,
    raw_dir: "leads/meta",
    stem: "leads_bitrix24",
    snapshot_dir: None,
};

static DEAL_FIELDS: ReferenceSpec = ReferenceSpec {
    count_key: None,
    raw_dir: "deals/meta",
    stem: "deals_bitrix24",
    snapshot_dir: None,
};

static STATUSES: ReferenceSpec = ReferenceSpec {
    count_key: Some("status_list"),
    raw_dir: "metadata",
    stem: "status_bitrix24",
    snapshot_dir: Some("status_list"),
};

static DEAL_CATEGORIES: ReferenceSpec = ReferenceSpec {
    count_key: Some("deal_category_list"),
    raw_dir: "deal_category_list",
    stem: "deal_category_bitrix24",
    snapshot_dir: Some("deal_category_list"),
};

impl Entity {
    pub const ALL: [Entity; 5] = [
        Entity::Leads,
        Entity::Deals,
        Entity::Contacts,
        Entity::Companies,
        Entity::Users,
    ];

    pub fn spec(self) -> &'static EntitySpec {
        match self {
            Entity::Leads => &LEADS,
            Entity::Deals => &DEALS,
            Entity::Contacts => &CONTACTS,
            Entity::Companies => &COMPANIES,
            Entity::Users => &USERS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Entity::Leads => "leads",
            Entity::Deals => "deals",
            Entity::Contacts => "contacts",
            Entity::Companies => "companies",
            Entity::Users => "users",
        }
    }

    /// Parse an entity from its name or its count key (`company_list`, `user_list`).
    pub fn from_name(name: &str) -> Option<Entity> {
        Entity::ALL
            .into_iter()
            .find(|e| e.name() == name || e.spec().count_key == name)
    }
}

impl ReferenceList {
    pub fn spec(self) -> &'static ReferenceSpec {
        match self {
            ReferenceList::LeadFields => &LEAD_FIELDS,
            ReferenceList::DealFields => &DEAL_FIELDS,
            ReferenceList::Statuses => &STATUSES,
            ReferenceList::DealCategories => &DEAL_CATEGORIES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReferenceList::LeadFields => "lead_fields",
            ReferenceList::DealFields => "deal_fields",
            ReferenceList::Statuses => "statuses",
            ReferenceList::DealCategories => "deal_categories",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ReferenceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::FetchSchema => f.write_str("fetch_schema"),
            Step::ProcessEntity(entity) => write!(f, "process_entity({entity})"),
            Step::FetchReference(list) => write!(f, "fetch_reference({list})"),
        }
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
