//! Attribute tag constants and the entry table of the built-in dictionary.
//!
//! Each constant maps an attribute alias to its tag,
//! so that no look-up is needed at run time.

use crate::dictionary::DictionaryEntryRef;
use crate::header::{Tag, VR};

/// FileMetaInformationGroupLength (0002,0000) UL
pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
/// FileMetaInformationVersion (0002,0001) OB
pub const FILE_META_INFORMATION_VERSION: Tag = Tag(0x0002, 0x0001);
/// MediaStorageSOPClassUID (0002,0002) UI
pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
/// MediaStorageSOPInstanceUID (0002,0003) UI
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
/// TransferSyntaxUID (0002,0010) UI
pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
/// ImplementationClassUID (0002,0012) UI
pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
/// ImplementationVersionName (0002,0013) SH
pub const IMPLEMENTATION_VERSION_NAME: Tag = Tag(0x0002, 0x0013);
/// SourceApplicationEntityTitle (0002,0016) AE
pub const SOURCE_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0002, 0x0016);
/// SendingApplicationEntityTitle (0002,0017) AE
pub const SENDING_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0002, 0x0017);
/// ReceivingApplicationEntityTitle (0002,0018) AE
pub const RECEIVING_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0002, 0x0018);
/// PrivateInformationCreatorUID (0002,0100) UI
pub const PRIVATE_INFORMATION_CREATOR_UID: Tag = Tag(0x0002, 0x0100);
/// PrivateInformation (0002,0102) OB
pub const PRIVATE_INFORMATION: Tag = Tag(0x0002, 0x0102);
/// SpecificCharacterSet (0008,0005) CS
pub const SPECIFIC_CHARACTER_SET: Tag = Tag(0x0008, 0x0005);
/// ImageType (0008,0008) CS
pub const IMAGE_TYPE: Tag = Tag(0x0008, 0x0008);
/// InstanceCreationDate (0008,0012) DA
pub const INSTANCE_CREATION_DATE: Tag = Tag(0x0008, 0x0012);
/// InstanceCreationTime (0008,0013) TM
pub const INSTANCE_CREATION_TIME: Tag = Tag(0x0008, 0x0013);
/// SOPClassUID (0008,0016) UI
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
/// SOPInstanceUID (0008,0018) UI
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
/// StudyDate (0008,0020) DA
pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
/// SeriesDate (0008,0021) DA
pub const SERIES_DATE: Tag = Tag(0x0008, 0x0021);
/// AcquisitionDate (0008,0022) DA
pub const ACQUISITION_DATE: Tag = Tag(0x0008, 0x0022);
/// ContentDate (0008,0023) DA
pub const CONTENT_DATE: Tag = Tag(0x0008, 0x0023);
/// AcquisitionDateTime (0008,002A) DT
pub const ACQUISITION_DATE_TIME: Tag = Tag(0x0008, 0x002A);
/// StudyTime (0008,0030) TM
pub const STUDY_TIME: Tag = Tag(0x0008, 0x0030);
/// SeriesTime (0008,0031) TM
pub const SERIES_TIME: Tag = Tag(0x0008, 0x0031);
/// AcquisitionTime (0008,0032) TM
pub const ACQUISITION_TIME: Tag = Tag(0x0008, 0x0032);
/// ContentTime (0008,0033) TM
pub const CONTENT_TIME: Tag = Tag(0x0008, 0x0033);
/// AccessionNumber (0008,0050) SH
pub const ACCESSION_NUMBER: Tag = Tag(0x0008, 0x0050);
/// Modality (0008,0060) CS
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
/// ConversionType (0008,0064) CS
pub const CONVERSION_TYPE: Tag = Tag(0x0008, 0x0064);
/// Manufacturer (0008,0070) LO
pub const MANUFACTURER: Tag = Tag(0x0008, 0x0070);
/// InstitutionName (0008,0080) LO
pub const INSTITUTION_NAME: Tag = Tag(0x0008, 0x0080);
/// ReferringPhysicianName (0008,0090) PN
pub const REFERRING_PHYSICIAN_NAME: Tag = Tag(0x0008, 0x0090);
/// StationName (0008,1010) SH
pub const STATION_NAME: Tag = Tag(0x0008, 0x1010);
/// StudyDescription (0008,1030) LO
pub const STUDY_DESCRIPTION: Tag = Tag(0x0008, 0x1030);
/// SeriesDescription (0008,103E) LO
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
/// ManufacturerModelName (0008,1090) LO
pub const MANUFACTURER_MODEL_NAME: Tag = Tag(0x0008, 0x1090);
/// ReferencedImageSequence (0008,1140) SQ
pub const REFERENCED_IMAGE_SEQUENCE: Tag = Tag(0x0008, 0x1140);
/// ReferencedSOPClassUID (0008,1150) UI
pub const REFERENCED_SOP_CLASS_UID: Tag = Tag(0x0008, 0x1150);
/// ReferencedSOPInstanceUID (0008,1155) UI
pub const REFERENCED_SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x1155);
/// DerivationDescription (0008,2111) ST
pub const DERIVATION_DESCRIPTION: Tag = Tag(0x0008, 0x2111);
/// PatientName (0010,0010) PN
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
/// PatientID (0010,0020) LO
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
/// PatientBirthDate (0010,0030) DA
pub const PATIENT_BIRTH_DATE: Tag = Tag(0x0010, 0x0030);
/// PatientSex (0010,0040) CS
pub const PATIENT_SEX: Tag = Tag(0x0010, 0x0040);
/// PatientAge (0010,1010) AS
pub const PATIENT_AGE: Tag = Tag(0x0010, 0x1010);
/// PatientSize (0010,1020) DS
pub const PATIENT_SIZE: Tag = Tag(0x0010, 0x1020);
/// PatientWeight (0010,1030) DS
pub const PATIENT_WEIGHT: Tag = Tag(0x0010, 0x1030);
/// PatientComments (0010,4000) LT
pub const PATIENT_COMMENTS: Tag = Tag(0x0010, 0x4000);
/// BodyPartExamined (0018,0015) CS
pub const BODY_PART_EXAMINED: Tag = Tag(0x0018, 0x0015);
/// SliceThickness (0018,0050) DS
pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
/// KVP (0018,0060) DS
pub const KVP: Tag = Tag(0x0018, 0x0060);
/// SpacingBetweenSlices (0018,0088) DS
pub const SPACING_BETWEEN_SLICES: Tag = Tag(0x0018, 0x0088);
/// SoftwareVersions (0018,1020) LO
pub const SOFTWARE_VERSIONS: Tag = Tag(0x0018, 0x1020);
/// ProtocolName (0018,1030) LO
pub const PROTOCOL_NAME: Tag = Tag(0x0018, 0x1030);
/// ExposureTime (0018,1150) IS
pub const EXPOSURE_TIME: Tag = Tag(0x0018, 0x1150);
/// XRayTubeCurrent (0018,1151) IS
pub const X_RAY_TUBE_CURRENT: Tag = Tag(0x0018, 0x1151);
/// PatientPosition (0018,5100) CS
pub const PATIENT_POSITION: Tag = Tag(0x0018, 0x5100);
/// StudyInstanceUID (0020,000D) UI
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
/// SeriesInstanceUID (0020,000E) UI
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
/// StudyID (0020,0010) SH
pub const STUDY_ID: Tag = Tag(0x0020, 0x0010);
/// SeriesNumber (0020,0011) IS
pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
/// AcquisitionNumber (0020,0012) IS
pub const ACQUISITION_NUMBER: Tag = Tag(0x0020, 0x0012);
/// InstanceNumber (0020,0013) IS
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
/// PatientOrientation (0020,0020) CS
pub const PATIENT_ORIENTATION: Tag = Tag(0x0020, 0x0020);
/// ImagePositionPatient (0020,0032) DS
pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
/// ImageOrientationPatient (0020,0037) DS
pub const IMAGE_ORIENTATION_PATIENT: Tag = Tag(0x0020, 0x0037);
/// FrameOfReferenceUID (0020,0052) UI
pub const FRAME_OF_REFERENCE_UID: Tag = Tag(0x0020, 0x0052);
/// SliceLocation (0020,1041) DS
pub const SLICE_LOCATION: Tag = Tag(0x0020, 0x1041);
/// SamplesPerPixel (0028,0002) US
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
/// PhotometricInterpretation (0028,0004) CS
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
/// PlanarConfiguration (0028,0006) US
pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
/// NumberOfFrames (0028,0008) IS
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
/// Rows (0028,0010) US
pub const ROWS: Tag = Tag(0x0028, 0x0010);
/// Columns (0028,0011) US
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
/// PixelSpacing (0028,0030) DS
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
/// BitsAllocated (0028,0100) US
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
/// BitsStored (0028,0101) US
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
/// HighBit (0028,0102) US
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
/// PixelRepresentation (0028,0103) US
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
/// SmallestImagePixelValue (0028,0106) US
pub const SMALLEST_IMAGE_PIXEL_VALUE: Tag = Tag(0x0028, 0x0106);
/// LargestImagePixelValue (0028,0107) US
pub const LARGEST_IMAGE_PIXEL_VALUE: Tag = Tag(0x0028, 0x0107);
/// WindowCenter (0028,1050) DS
pub const WINDOW_CENTER: Tag = Tag(0x0028, 0x1050);
/// WindowWidth (0028,1051) DS
pub const WINDOW_WIDTH: Tag = Tag(0x0028, 0x1051);
/// RescaleIntercept (0028,1052) DS
pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
/// RescaleSlope (0028,1053) DS
pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
/// RescaleType (0028,1054) LO
pub const RESCALE_TYPE: Tag = Tag(0x0028, 0x1054);
/// WindowCenterWidthExplanation (0028,1055) LO
pub const WINDOW_CENTER_WIDTH_EXPLANATION: Tag = Tag(0x0028, 0x1055);
/// VOILUTFunction (0028,1056) CS
pub const VOILUT_FUNCTION: Tag = Tag(0x0028, 0x1056);
/// LossyImageCompression (0028,2110) CS
pub const LOSSY_IMAGE_COMPRESSION: Tag = Tag(0x0028, 0x2110);
/// RequestedProcedureDescription (0032,1060) LO
pub const REQUESTED_PROCEDURE_DESCRIPTION: Tag = Tag(0x0032, 0x1060);
/// RequestAttributesSequence (0040,0275) SQ
pub const REQUEST_ATTRIBUTES_SEQUENCE: Tag = Tag(0x0040, 0x0275);
/// FloatPixelData (7FE0,0008) OF
pub const FLOAT_PIXEL_DATA: Tag = Tag(0x7FE0, 0x0008);
/// DoubleFloatPixelData (7FE0,0009) OD
pub const DOUBLE_FLOAT_PIXEL_DATA: Tag = Tag(0x7FE0, 0x0009);
/// PixelData (7FE0,0010) OB
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);
/// Item (FFFE,E000) UN
pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
/// ItemDelimitationItem (FFFE,E00D) UN
pub const ITEM_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE00D);
/// SequenceDelimitationItem (FFFE,E0DD) UN
pub const SEQUENCE_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE0DD);

type E = DictionaryEntryRef<'static>;

#[rustfmt::skip]
pub(crate) const ENTRIES: &[E] = &[
    E { tag: FILE_META_INFORMATION_GROUP_LENGTH, alias: "FileMetaInformationGroupLength", vr: VR::UL },
    E { tag: FILE_META_INFORMATION_VERSION, alias: "FileMetaInformationVersion", vr: VR::OB },
    E { tag: MEDIA_STORAGE_SOP_CLASS_UID, alias: "MediaStorageSOPClassUID", vr: VR::UI },
    E { tag: MEDIA_STORAGE_SOP_INSTANCE_UID, alias: "MediaStorageSOPInstanceUID", vr: VR::UI },
    E { tag: TRANSFER_SYNTAX_UID, alias: "TransferSyntaxUID", vr: VR::UI },
    E { tag: IMPLEMENTATION_CLASS_UID, alias: "ImplementationClassUID", vr: VR::UI },
    E { tag: IMPLEMENTATION_VERSION_NAME, alias: "ImplementationVersionName", vr: VR::SH },
    E { tag: SOURCE_APPLICATION_ENTITY_TITLE, alias: "SourceApplicationEntityTitle", vr: VR::AE },
    E { tag: SENDING_APPLICATION_ENTITY_TITLE, alias: "SendingApplicationEntityTitle", vr: VR::AE },
    E { tag: RECEIVING_APPLICATION_ENTITY_TITLE, alias: "ReceivingApplicationEntityTitle", vr: VR::AE },
    E { tag: PRIVATE_INFORMATION_CREATOR_UID, alias: "PrivateInformationCreatorUID", vr: VR::UI },
    E { tag: PRIVATE_INFORMATION, alias: "PrivateInformation", vr: VR::OB },
    E { tag: SPECIFIC_CHARACTER_SET, alias: "SpecificCharacterSet", vr: VR::CS },
    E { tag: IMAGE_TYPE, alias: "ImageType", vr: VR::CS },
    E { tag: INSTANCE_CREATION_DATE, alias: "InstanceCreationDate", vr: VR::DA },
    E { tag: INSTANCE_CREATION_TIME, alias: "InstanceCreationTime", vr: VR::TM },
    E { tag: SOP_CLASS_UID, alias: "SOPClassUID", vr: VR::UI },
    E { tag: SOP_INSTANCE_UID, alias: "SOPInstanceUID", vr: VR::UI },
    E { tag: STUDY_DATE, alias: "StudyDate", vr: VR::DA },
    E { tag: SERIES_DATE, alias: "SeriesDate", vr: VR::DA },
    E { tag: ACQUISITION_DATE, alias: "AcquisitionDate", vr: VR::DA },
    E { tag: CONTENT_DATE, alias: "ContentDate", vr: VR::DA },
    E { tag: ACQUISITION_DATE_TIME, alias: "AcquisitionDateTime", vr: VR::DT },
    E { tag: STUDY_TIME, alias: "StudyTime", vr: VR::TM },
    E { tag: SERIES_TIME, alias: "SeriesTime", vr: VR::TM },
    E { tag: ACQUISITION_TIME, alias: "AcquisitionTime", vr: VR::TM },
    E { tag: CONTENT_TIME, alias: "ContentTime", vr: VR::TM },
    E { tag: ACCESSION_NUMBER, alias: "AccessionNumber", vr: VR::SH },
    E { tag: MODALITY, alias: "Modality", vr: VR::CS },
    E { tag: CONVERSION_TYPE, alias: "ConversionType", vr: VR::CS },
    E { tag: MANUFACTURER, alias: "Manufacturer", vr: VR::LO },
    E { tag: INSTITUTION_NAME, alias: "InstitutionName", vr: VR::LO },
    E { tag: REFERRING_PHYSICIAN_NAME, alias: "ReferringPhysicianName", vr: VR::PN },
    E { tag: STATION_NAME, alias: "StationName", vr: VR::SH },
    E { tag: STUDY_DESCRIPTION, alias: "StudyDescription", vr: VR::LO },
    E { tag: SERIES_DESCRIPTION, alias: "SeriesDescription", vr: VR::LO },
    E { tag: MANUFACTURER_MODEL_NAME, alias: "ManufacturerModelName", vr: VR::LO },
    E { tag: REFERENCED_IMAGE_SEQUENCE, alias: "ReferencedImageSequence", vr: VR::SQ },
    E { tag: REFERENCED_SOP_CLASS_UID, alias: "ReferencedSOPClassUID", vr: VR::UI },
    E { tag: REFERENCED_SOP_INSTANCE_UID, alias: "ReferencedSOPInstanceUID", vr: VR::UI },
    E { tag: DERIVATION_DESCRIPTION, alias: "DerivationDescription", vr: VR::ST },
    E { tag: PATIENT_NAME, alias: "PatientName", vr: VR::PN },
    E { tag: PATIENT_ID, alias: "PatientID", vr: VR::LO },
    E { tag: PATIENT_BIRTH_DATE, alias: "PatientBirthDate", vr: VR::DA },
    E { tag: PATIENT_SEX, alias: "PatientSex", vr: VR::CS },
    E { tag: PATIENT_AGE, alias: "PatientAge", vr: VR::AS },
    E { tag: PATIENT_SIZE, alias: "PatientSize", vr: VR::DS },
    E { tag: PATIENT_WEIGHT, alias: "PatientWeight", vr: VR::DS },
    E { tag: PATIENT_COMMENTS, alias: "PatientComments", vr: VR::LT },
    E { tag: BODY_PART_EXAMINED, alias: "BodyPartExamined", vr: VR::CS },
    E { tag: SLICE_THICKNESS, alias: "SliceThickness", vr: VR::DS },
    E { tag: KVP, alias: "KVP", vr: VR::DS },
    E { tag: SPACING_BETWEEN_SLICES, alias: "SpacingBetweenSlices", vr: VR::DS },
    E { tag: SOFTWARE_VERSIONS, alias: "SoftwareVersions", vr: VR::LO },
    E { tag: PROTOCOL_NAME, alias: "ProtocolName", vr: VR::LO },
    E { tag: EXPOSURE_TIME, alias: "ExposureTime", vr: VR::IS },
    E { tag: X_RAY_TUBE_CURRENT, alias: "XRayTubeCurrent", vr: VR::IS },
    E { tag: PATIENT_POSITION, alias: "PatientPosition", vr: VR::CS },
    E { tag: STUDY_INSTANCE_UID, alias: "StudyInstanceUID", vr: VR::UI },
    E { tag: SERIES_INSTANCE_UID, alias: "SeriesInstanceUID", vr: VR::UI },
    E { tag: STUDY_ID, alias: "StudyID", vr: VR::SH },
    E { tag: SERIES_NUMBER, alias: "SeriesNumber", vr: VR::IS },
    E { tag: ACQUISITION_NUMBER, alias: "AcquisitionNumber", vr: VR::IS },
    E { tag: INSTANCE_NUMBER, alias: "InstanceNumber", vr: VR::IS },
    E { tag: PATIENT_ORIENTATION, alias: "PatientOrientation", vr: VR::CS },
    E { tag: IMAGE_POSITION_PATIENT, alias: "ImagePositionPatient", vr: VR::DS },
    E { tag: IMAGE_ORIENTATION_PATIENT, alias: "ImageOrientationPatient", vr: VR::DS },
    E { tag: FRAME_OF_REFERENCE_UID, alias: "FrameOfReferenceUID", vr: VR::UI },
    E { tag: SLICE_LOCATION, alias: "SliceLocation", vr: VR::DS },
    E { tag: SAMPLES_PER_PIXEL, alias: "SamplesPerPixel", vr: VR::US },
    E { tag: PHOTOMETRIC_INTERPRETATION, alias: "PhotometricInterpretation", vr: VR::CS },
    E { tag: PLANAR_CONFIGURATION, alias: "PlanarConfiguration", vr: VR::US },
    E { tag: NUMBER_OF_FRAMES, alias: "NumberOfFrames", vr: VR::IS },
    E { tag: ROWS, alias: "Rows", vr: VR::US },
    E { tag: COLUMNS, alias: "Columns", vr: VR::US },
    E { tag: PIXEL_SPACING, alias: "PixelSpacing", vr: VR::DS },
    E { tag: BITS_ALLOCATED, alias: "BitsAllocated", vr: VR::US },
    E { tag: BITS_STORED, alias: "BitsStored", vr: VR::US },
    E { tag: HIGH_BIT, alias: "HighBit", vr: VR::US },
    E { tag: PIXEL_REPRESENTATION, alias: "PixelRepresentation", vr: VR::US },
    E { tag: SMALLEST_IMAGE_PIXEL_VALUE, alias: "SmallestImagePixelValue", vr: VR::US },
    E { tag: LARGEST_IMAGE_PIXEL_VALUE, alias: "LargestImagePixelValue", vr: VR::US },
    E { tag: WINDOW_CENTER, alias: "WindowCenter", vr: VR::DS },
    E { tag: WINDOW_WIDTH, alias: "WindowWidth", vr: VR::DS },
    E { tag: RESCALE_INTERCEPT, alias: "RescaleIntercept", vr: VR::DS },
    E { tag: RESCALE_SLOPE, alias: "RescaleSlope", vr: VR::DS },
    E { tag: RESCALE_TYPE, alias: "RescaleType", vr: VR::LO },
    E { tag: WINDOW_CENTER_WIDTH_EXPLANATION, alias: "WindowCenterWidthExplanation", vr: VR::LO },
    E { tag: VOILUT_FUNCTION, alias: "VOILUTFunction", vr: VR::CS },
    E { tag: LOSSY_IMAGE_COMPRESSION, alias: "LossyImageCompression", vr: VR::CS },
    E { tag: REQUESTED_PROCEDURE_DESCRIPTION, alias: "RequestedProcedureDescription", vr: VR::LO },
    E { tag: REQUEST_ATTRIBUTES_SEQUENCE, alias: "RequestAttributesSequence", vr: VR::SQ },
    E { tag: FLOAT_PIXEL_DATA, alias: "FloatPixelData", vr: VR::OF },
    E { tag: DOUBLE_FLOAT_PIXEL_DATA, alias: "DoubleFloatPixelData", vr: VR::OD },
    E { tag: PIXEL_DATA, alias: "PixelData", vr: VR::OB },
    E { tag: ITEM, alias: "Item", vr: VR::UN },
    E { tag: ITEM_DELIMITATION_ITEM, alias: "ItemDelimitationItem", vr: VR::UN },
    E { tag: SEQUENCE_DELIMITATION_ITEM, alias: "SequenceDelimitationItem", vr: VR::UN },
];
